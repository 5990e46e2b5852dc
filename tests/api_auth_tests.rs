//! 认证 API 集成测试

use axum::http::{Method, StatusCode};
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

mod common;
use common::{TestApp, PASSWORD};

#[tokio::test]
async fn test_login_returns_token_and_role_names() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    app.user(tenant.id, "teacher@gv.test", &["Teacher"]).await;

    let (status, json) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "tenantId": tenant.id, "email": "teacher@gv.test", "password": PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["tokenType"], "Bearer");
    assert_eq!(json["data"]["expiresIn"], 900);
    assert_eq!(json["data"]["roles"], json!(["Teacher"]));
    assert!(json["data"]["user"].get("passwordHash").is_none());

    // 签发的令牌可直接使用
    let token = json["data"]["accessToken"].as_str().unwrap();
    let (status, me) = app.get("/api/v1/auth/me", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], "teacher@gv.test");
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_user_look_the_same() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    app.user(tenant.id, "teacher@gv.test", &["Teacher"]).await;

    let (wrong_status, wrong) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "tenantId": tenant.id, "email": "teacher@gv.test", "password": "Nope12345" })),
        )
        .await;
    let (unknown_status, unknown) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "tenantId": tenant.id, "email": "ghost@gv.test", "password": PASSWORD })),
        )
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong["message"], unknown["message"]);
    assert_eq!(wrong["success"], false);
}

#[tokio::test]
async fn test_login_is_scoped_to_tenant() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    let other = app.tenant("Hill Side").await;
    app.user(tenant.id, "teacher@gv.test", &["Teacher"]).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "tenantId": other.id, "email": "teacher@gv.test", "password": PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_validation_reports_fields() {
    let app = TestApp::new().await;

    let (status, json) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "tenantId": Uuid::new_v4(), "email": "not-an-email", "password": "" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["errors"]["email"].is_array());
    assert!(json["errors"]["password"].is_array());
}

#[tokio::test]
async fn test_me_lists_effective_permissions() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    let parent = app.user(tenant.id, "parent@gv.test", &["Parent"]).await;

    let (status, json) = app.get("/api/v1/auth/me", &parent.token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["userId"], parent.id.to_string());
    assert_eq!(json["data"]["tenantId"], tenant.id.to_string());
    let permissions: Vec<&str> = json["data"]["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p.as_str())
        .collect();
    assert!(permissions.contains(&"leave:create"));
    assert!(!permissions.contains(&"roles:manage"));
}

#[tokio::test]
#[serial]
async fn test_missing_token_returns_401_envelope() {
    let app = TestApp::new().await;

    let (status, json) = app.request(Method::GET, "/api/v1/auth/me", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Authentication required");
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/v1/roles", "not.a.token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_error_details_only_when_exposed() {
    let app = TestApp::new().await;

    school_system::error::set_expose_error_details(true);
    let (_, exposed) = app.request(Method::GET, "/api/v1/auth/me", None, None).await;
    school_system::error::set_expose_error_details(false);
    let (_, hidden) = app.request(Method::GET, "/api/v1/auth/me", None, None).await;

    assert_eq!(exposed["error"], "Authentication failed");
    assert!(hidden.get("error").is_none());
    assert_eq!(exposed["message"], hidden["message"]);
}
