//! 错误处理单元测试
//!
//! 覆盖状态码映射、用户消息、响应信封和 validator 转换

use axum::{http::StatusCode, response::IntoResponse};
use http_body_util::BodyExt;
use school_system::error::{AppError, ErrorResponse};
use validator::Validate;

// ==================== 状态码测试 ====================

#[test]
fn test_status_codes() {
    assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::denied("roles:manage").status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::TenantMismatch.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::not_found("Role").status_code(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::conflict("taken").status_code(), StatusCode::CONFLICT);
    assert_eq!(
        AppError::RoleInUse { user_count: 3 }.status_code(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        AppError::invalid_field("name", "is required").status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::Config("bad".to_string()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_error_code_consistency() {
    let errors = vec![
        AppError::Unauthorized,
        AppError::TenantMismatch,
        AppError::SystemRoleProtected("Administrator".to_string()),
        AppError::not_found("test"),
        AppError::BadRequest("test".to_string()),
        AppError::RoleInUse { user_count: 1 },
        AppError::internal_error("test"),
    ];

    for error in errors {
        assert_eq!(error.code(), error.status_code().as_u16());
    }
}

// ==================== 用户消息测试 ====================

#[test]
fn test_user_messages_hide_internals() {
    let db_error = AppError::Database(sqlx::Error::RowNotFound);
    assert_eq!(db_error.user_message(), "Database error occurred");

    let config_error = AppError::Config("Missing jwt secret".to_string());
    assert_eq!(config_error.user_message(), "Configuration error");
    assert!(!config_error.user_message().contains("jwt"));

    let internal = AppError::internal_error("connection reset by peer");
    assert_eq!(internal.user_message(), "Internal server error");
}

#[test]
fn test_user_messages_for_client_errors() {
    assert_eq!(AppError::Unauthorized.user_message(), "Authentication required");
    assert_eq!(
        AppError::denied("roles:manage").user_message(),
        "You do not have permission to perform this action"
    );
    assert_eq!(
        AppError::TenantMismatch.user_message(),
        "Access to another tenant is not allowed"
    );
    assert_eq!(AppError::not_found("Role").user_message(), "Role not found");
    assert_eq!(
        AppError::conflict("Role with this name already exists").user_message(),
        "Role with this name already exists"
    );
    assert_eq!(
        AppError::RoleInUse { user_count: 2 }.user_message(),
        "Cannot delete role: it is assigned to 2 user(s)"
    );
}

#[test]
fn test_denied_message_does_not_leak_policy() {
    let err = AppError::denied("any_of(audit-logs:read)");
    assert!(!err.user_message().contains("audit-logs"));
    assert!(err.to_string().contains("audit-logs"));
}

// ==================== 响应信封测试 ====================

#[test]
fn test_envelope_fields() {
    let body = ErrorResponse::from_error(&AppError::invalid_field("roleIds", "Unknown role id"), false);
    let json = serde_json::to_value(&body).unwrap();

    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Unknown role id");
    assert_eq!(json["errors"]["roleIds"][0], "Unknown role id");
    assert!(json.get("error").is_none());
    assert!(json.get("userCount").is_none());
}

#[test]
fn test_envelope_exposes_detail_on_request() {
    let err = AppError::conflict("Role with this name already exists");
    let json = serde_json::to_value(ErrorResponse::from_error(&err, true)).unwrap();
    assert_eq!(json["error"], "Conflict: Role with this name already exists");
}

#[tokio::test]
async fn test_into_response_writes_envelope() {
    let response = AppError::RoleInUse { user_count: 4 }.into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["userCount"], 4);
    assert_eq!(json["success"], false);
}

// ==================== 转换测试 ====================

#[derive(Validate)]
struct Sample {
    #[validate(email(message = "must be a valid email address"))]
    email: String,
    #[validate(length(min = 1))]
    name: String,
}

#[test]
fn test_from_validation_errors_keeps_fields() {
    let sample = Sample {
        email: "nope".to_string(),
        name: String::new(),
    };
    let err: AppError = sample.validate().unwrap_err().into();

    match err {
        AppError::Validation { message, fields } => {
            assert_eq!(message, "Request validation failed");
            assert_eq!(fields["email"], vec!["must be a valid email address".to_string()]);
            // 未配置 message 时退回错误码
            assert_eq!(fields["name"], vec!["length".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_from_sqlx_error() {
    let app_error = AppError::from(sqlx::Error::RowNotFound);
    assert!(matches!(app_error, AppError::Database(_)));
}

#[test]
fn test_error_with_question_mark_operator() {
    fn inner() -> school_system::error::Result<()> {
        Err(AppError::TenantMismatch)
    }

    fn outer() -> school_system::error::Result<()> {
        inner()?;
        Ok(())
    }

    assert!(matches!(outer(), Err(AppError::TenantMismatch)));
}
