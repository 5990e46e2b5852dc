//! Tenant, user and student directory models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Tenant (one school / organisation)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 3, max = 253))]
    pub domain: String,
    #[validate(email)]
    pub email: String,
}

/// User account, always owned by exactly one tenant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// User view without credentials
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            email: user.email,
            name: user.name,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub name: String,
    pub password: String,
    /// Role ids assigned right after creation
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
}

/// Insert payload used by the repositories
#[derive(Debug, Clone)]
pub struct NewUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// Student
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub class_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudentRequest {
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub name: String,
    pub class_name: Option<String>,
}

/// Parent / guardian linked to a student; `user_id` is set when the parent has an account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudentParent {
    pub id: Uuid,
    pub student_id: Uuid,
    pub name: String,
    pub relationship: String,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LinkParentRequest {
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "is required"))]
    pub relationship: String,
    pub user_id: Option<Uuid>,
}

/// New tenant plus its first administrator account
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionTenantRequest {
    #[validate(nested)]
    pub tenant: CreateTenantRequest,
    #[validate(email(message = "must be a valid email address"))]
    pub admin_email: String,
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub admin_name: String,
    pub admin_password: String,
}
