//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 是否在错误响应中暴露内部细节（仅开发环境）
static EXPOSE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

/// 由启动流程根据 `app.environment` 设置
pub fn set_expose_error_details(enabled: bool) {
    EXPOSE_ERROR_DETAILS.store(enabled, Ordering::Relaxed);
}

pub fn expose_error_details() -> bool {
    EXPOSE_ERROR_DETAILS.load(Ordering::Relaxed)
}

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Tenant mismatch")]
    TenantMismatch,

    #[error("System role cannot be modified: {0}")]
    SystemRoleProtected(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Role is assigned to {user_count} user(s)")]
    RoleInUse { user_count: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_)
            | AppError::TenantMismatch
            | AppError::SystemRoleProtected(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::RoleInUse { .. } => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation { message, .. } => message.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Unauthorized => "Authentication required".to_string(),
            AppError::PermissionDenied(_) => {
                "You do not have permission to perform this action".to_string()
            }
            AppError::TenantMismatch => "Access to another tenant is not allowed".to_string(),
            AppError::SystemRoleProtected(_) => "System roles cannot be modified".to_string(),
            AppError::NotFound(msg) => format!("{} not found", msg),
            AppError::Conflict(msg) => msg.clone(),
            AppError::RoleInUse { user_count } => format!(
                "Cannot delete role: it is assigned to {} user(s)",
                user_count
            ),
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    // 便捷方法
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(what.to_string())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        AppError::PermissionDenied(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// 单字段校验错误
    pub fn invalid_field(field: &str, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), vec![msg.clone()]);
        AppError::Validation {
            message: msg,
            fields,
        }
    }
}

/// 错误响应 DTO
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
    #[serde(rename = "userCount", skip_serializing_if = "Option::is_none")]
    pub user_count: Option<i64>,
}

impl ErrorResponse {
    pub fn from_error(err: &AppError, expose_details: bool) -> Self {
        let fields = match err {
            AppError::Validation { fields, .. } if !fields.is_empty() => Some(fields.clone()),
            _ => None,
        };
        let user_count = match err {
            AppError::RoleInUse { user_count } => Some(*user_count),
            _ => None,
        };

        Self {
            success: false,
            message: err.user_message(),
            error: expose_details.then(|| err.to_string()),
            errors: fields,
            user_count,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::from_error(&self, expose_error_details());

        // 记录错误日志：客户端错误不作为系统错误
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Application error");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// 从 validator 校验结果转换，保留字段级信息
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = BTreeMap::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }

        AppError::Validation {
            message: "Request validation failed".to_string(),
            fields,
        }
    }
}
