//! 权限目录与权限检查服务

use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    authz::{PermissionPolicy, PermissionSet},
    error::{AppError, Result},
    models::role::{parse_permission_name, permission_name, Permission, Role},
    repository::{RoleRepository, Upserted},
};

/// Outcome of `assign_permissions_to_role`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentOutcome {
    pub assigned: usize,
    pub already_present: usize,
    /// Names with no matching permission row
    pub skipped: Vec<String>,
    pub failed: usize,
}

pub struct PermissionService {
    roles: Arc<dyn RoleRepository>,
}

impl PermissionService {
    pub fn new(roles: Arc<dyn RoleRepository>) -> Self {
        Self { roles }
    }

    /// 幂等确保权限存在（按 `resource:action` 去重，不覆盖已有描述）
    pub async fn ensure_permission(
        &self,
        resource: &str,
        action: &str,
        description: Option<&str>,
    ) -> Result<Upserted<Permission>> {
        let name = permission_name(resource, action);
        if parse_permission_name(&name).is_none() {
            return Err(AppError::invalid_field(
                "name",
                format!("'{}' is not a valid resource:action permission name", name),
            ));
        }

        let result = self.roles.ensure_permission(resource, action, description).await?;
        if result.created {
            tracing::info!(permission = %name, "Permission created");
        }
        Ok(result)
    }

    /// 幂等确保租户内角色存在
    pub async fn ensure_role(
        &self,
        tenant_id: Uuid,
        name: &str,
        description: Option<&str>,
        is_system: bool,
    ) -> Result<Upserted<Role>> {
        let result = self
            .roles
            .ensure_role(tenant_id, name, description, is_system)
            .await?;
        if result.created {
            tracing::info!(tenant_id = %tenant_id, role = %name, is_system, "Role created");
        }
        Ok(result)
    }

    /// 按名称为角色追加权限；未知名称跳过，单条失败不影响其余
    pub async fn assign_permissions_to_role<S: AsRef<str>>(
        &self,
        role_id: Uuid,
        permission_names: &[S],
    ) -> AssignmentOutcome {
        let mut outcome = AssignmentOutcome::default();

        for name in permission_names {
            let name = name.as_ref();
            let permission = match self.roles.find_permission_by_name(name).await {
                Ok(Some(permission)) => permission,
                Ok(None) => {
                    tracing::warn!(role_id = %role_id, permission = %name, "Unknown permission skipped");
                    outcome.skipped.push(name.to_string());
                    continue;
                }
                Err(e) => {
                    tracing::error!(role_id = %role_id, permission = %name, error = %e, "Permission lookup failed");
                    outcome.failed += 1;
                    continue;
                }
            };

            match self.roles.add_role_permission(role_id, permission.id).await {
                Ok(true) => outcome.assigned += 1,
                Ok(false) => outcome.already_present += 1,
                Err(e) => {
                    tracing::error!(role_id = %role_id, permission = %name, error = %e, "Failed to assign permission");
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    /// 用户在租户内的有效权限（所有角色权限的并集），每次调用都重新读取
    pub async fn effective_permissions(&self, tenant_id: Uuid, user_id: Uuid) -> Result<PermissionSet> {
        let names = self
            .roles
            .effective_permission_names(tenant_id, user_id)
            .await?;
        Ok(names.into_iter().collect())
    }

    /// 检查权限，不满足策略时返回 PermissionDenied
    pub async fn authorize(&self, ctx: &AuthContext, policy: &PermissionPolicy) -> Result<PermissionSet> {
        let granted = self.effective_permissions(ctx.tenant_id, ctx.user_id).await?;

        if !policy.allows(&granted) {
            metrics::counter!("authz_denied_total").increment(1);
            tracing::warn!(
                user_id = %ctx.user_id,
                tenant_id = %ctx.tenant_id,
                policy = %policy,
                "Permission denied"
            );
            return Err(AppError::denied(policy.to_string()));
        }

        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    fn service() -> (PermissionService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (PermissionService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_ensure_permission_is_idempotent() {
        let (svc, store) = service();

        let first = svc.ensure_permission("library", "read", Some("Read")).await.unwrap();
        let second = svc.ensure_permission("library", "read", Some("Changed")).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.value.id, second.value.id);
        assert_eq!(second.value.description.as_deref(), Some("Read"));
        assert_eq!(store.count_permissions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ensure_permission_rejects_bad_names() {
        let (svc, _) = service();
        assert!(svc.ensure_permission("Library", "read", None).await.is_err());
        assert!(svc.ensure_permission("library", "", None).await.is_err());
    }

    #[tokio::test]
    async fn test_assign_skips_unknown_names() {
        let (svc, _) = service();
        let tenant = Uuid::new_v4();
        svc.ensure_permission("library", "read", None).await.unwrap();
        let role = svc.ensure_role(tenant, "Librarian", None, false).await.unwrap().value;

        let outcome = svc
            .assign_permissions_to_role(role.id, &["library:read", "library:teleport"])
            .await;
        assert_eq!(outcome.assigned, 1);
        assert_eq!(outcome.skipped, vec!["library:teleport".to_string()]);

        let again = svc.assign_permissions_to_role(role.id, &["library:read"]).await;
        assert_eq!(again.assigned, 0);
        assert_eq!(again.already_present, 1);
    }

    #[tokio::test]
    async fn test_effective_permissions_are_union_of_roles() {
        let (svc, store) = service();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        for (r, a) in [("library", "read"), ("billing", "read"), ("transport", "read")] {
            svc.ensure_permission(r, a, None).await.unwrap();
        }
        let r1 = svc.ensure_role(tenant, "R1", None, false).await.unwrap().value;
        let r2 = svc.ensure_role(tenant, "R2", None, false).await.unwrap().value;
        svc.assign_permissions_to_role(r1.id, &["library:read"]).await;
        svc.assign_permissions_to_role(r2.id, &["billing:read"]).await;
        store.assign_user_role(tenant, user, r1.id).await.unwrap();
        store.assign_user_role(tenant, user, r2.id).await.unwrap();

        let granted = svc.effective_permissions(tenant, user).await.unwrap();
        assert!(granted.contains("library:read"));
        assert!(granted.contains("billing:read"));
        assert!(!granted.contains("transport:read"));

        // 其他租户下没有任何权限
        let elsewhere = svc.effective_permissions(Uuid::new_v4(), user).await.unwrap();
        assert!(elsewhere.is_empty());
    }
}
