//! Authentication-related models

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub tenant_id: Uuid,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: super::directory::UserResponse,
    pub roles: Vec<String>,
}

/// `GET /auth/me`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: crate::auth::AuthContext,
    pub permissions: Vec<String>,
}
