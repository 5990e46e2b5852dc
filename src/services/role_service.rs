//! 角色管理服务：租户内角色 CRUD 与用户角色分配

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, Result},
    models::role::*,
    repository::{DirectoryRepository, RoleRepository},
};

pub struct RoleService {
    roles: Arc<dyn RoleRepository>,
    directory: Arc<dyn DirectoryRepository>,
}

impl RoleService {
    pub fn new(roles: Arc<dyn RoleRepository>, directory: Arc<dyn DirectoryRepository>) -> Self {
        Self { roles, directory }
    }

    async fn details(&self, role: Role) -> Result<RoleDetails> {
        let permissions = self.roles.role_permissions(role.id).await?;
        let users = self.roles.role_members(role.id).await?;
        Ok(RoleDetails {
            role,
            permissions,
            users,
        })
    }

    async fn require_role(&self, tenant_id: Uuid, role_id: Uuid) -> Result<Role> {
        self.roles
            .find_role(tenant_id, role_id)
            .await?
            .ok_or_else(|| AppError::not_found("Role"))
    }

    async fn require_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<()> {
        self.directory
            .find_user(tenant_id, user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// 去重并校验所有权限 ID 都存在；存在未知 ID 时整体拒绝
    async fn resolve_permission_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let mut seen = HashSet::new();
        let unique: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let found: HashSet<Uuid> = self
            .roles
            .find_permissions_by_ids(&unique)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        let unknown: Vec<String> = unique
            .iter()
            .filter(|id| !found.contains(*id))
            .map(Uuid::to_string)
            .collect();

        if !unknown.is_empty() {
            return Err(AppError::invalid_field(
                "permissionIds",
                format!("Unknown permission ids: {}", unknown.join(", ")),
            ));
        }

        Ok(unique)
    }

    /// 列出租户内所有角色（含权限与成员）
    pub async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<RoleDetails>> {
        let roles = self.roles.list_roles(tenant_id).await?;
        let mut result = Vec::with_capacity(roles.len());
        for role in roles {
            result.push(self.details(role).await?);
        }
        Ok(result)
    }

    pub async fn get_role(&self, tenant_id: Uuid, role_id: Uuid) -> Result<RoleDetails> {
        let role = self.require_role(tenant_id, role_id).await?;
        self.details(role).await
    }

    /// 创建角色
    pub async fn create_role(&self, tenant_id: Uuid, req: CreateRoleRequest) -> Result<RoleDetails> {
        req.validate()?;
        let name = req.name.trim();
        let permission_ids = self.resolve_permission_ids(&req.permission_ids).await?;

        let role = self
            .roles
            .create_role(tenant_id, name, req.description.as_deref(), &permission_ids)
            .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            role_id = %role.id,
            role = %role.name,
            permissions = permission_ids.len(),
            "Role created"
        );

        self.details(role).await
    }

    /// 更新角色（权限集合整体替换）
    pub async fn update_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        req: UpdateRoleRequest,
    ) -> Result<RoleDetails> {
        let existing = self.require_role(tenant_id, role_id).await?;
        if existing.is_system {
            return Err(AppError::SystemRoleProtected(existing.name));
        }

        req.validate()?;
        let permission_ids = self.resolve_permission_ids(&req.permission_ids).await?;

        let role = self
            .roles
            .update_role(
                tenant_id,
                role_id,
                req.name.trim(),
                req.description.as_deref(),
                &permission_ids,
            )
            .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            role_id = %role.id,
            permissions = permission_ids.len(),
            "Role updated"
        );

        self.details(role).await
    }

    /// 删除角色
    pub async fn delete_role(&self, tenant_id: Uuid, role_id: Uuid) -> Result<()> {
        let existing = self.require_role(tenant_id, role_id).await?;
        if existing.is_system {
            return Err(AppError::SystemRoleProtected(existing.name));
        }

        self.roles.delete_role(tenant_id, role_id).await?;
        tracing::info!(tenant_id = %tenant_id, role_id = %role_id, role = %existing.name, "Role deleted");
        Ok(())
    }

    /// 权限目录
    pub async fn list_permissions(&self) -> Result<Vec<Permission>> {
        self.roles.list_permissions().await
    }

    pub async fn user_roles(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Role>> {
        self.require_user(tenant_id, user_id).await?;
        self.roles.user_roles(tenant_id, user_id).await
    }

    /// 为用户分配角色（幂等），返回是否新建了分配
    pub async fn assign_role(&self, tenant_id: Uuid, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        self.require_user(tenant_id, user_id).await?;
        self.require_role(tenant_id, role_id).await?;

        let created = self.roles.assign_user_role(tenant_id, user_id, role_id).await?;
        if created {
            tracing::info!(tenant_id = %tenant_id, user_id = %user_id, role_id = %role_id, "Role assigned");
        }
        Ok(created)
    }

    pub async fn revoke_role(&self, tenant_id: Uuid, user_id: Uuid, role_id: Uuid) -> Result<()> {
        if !self.roles.revoke_user_role(tenant_id, user_id, role_id).await? {
            return Err(AppError::not_found("Role assignment"));
        }
        tracing::info!(tenant_id = %tenant_id, user_id = %user_id, role_id = %role_id, "Role revoked");
        Ok(())
    }
}
