//! Role and permission domain models

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// `resource:action`, lowercase, dashes allowed inside each part
static PERMISSION_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("valid permission regex"));

/// Canonical permission name used by every authorization check
pub fn permission_name(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Splits `resource:action`; `None` when the name is not canonical
pub fn parse_permission_name(name: &str) -> Option<(&str, &str)> {
    let (resource, action) = name.split_once(':')?;
    if PERMISSION_PART.is_match(resource) && PERMISSION_PART.is_match(action) {
        Some((resource, action))
    } else {
        None
    }
}

/// Permission (global, not tenant scoped)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: Uuid,
    pub resource: String,
    pub action: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Role (tenant scoped)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User holding a role, as shown in role listings
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoleMember {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
}

/// Role with its permissions and assigned users
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDetails {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub users: Vec<RoleMember>,
}

/// User <-> role assignment within one tenant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub tenant_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

/// Create role request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

/// Update role request; the permission list replaces the current set
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

/// Assign role request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_name_round_trip() {
        let name = permission_name("audit-logs", "read");
        assert_eq!(name, "audit-logs:read");
        assert_eq!(parse_permission_name(&name), Some(("audit-logs", "read")));
    }

    #[test]
    fn test_rejects_non_canonical_names() {
        assert!(parse_permission_name("library").is_none());
        assert!(parse_permission_name("Library:Read").is_none());
        assert!(parse_permission_name("library:").is_none());
        assert!(parse_permission_name(":read").is_none());
        assert!(parse_permission_name("library:read:extra").is_none());
    }
}
