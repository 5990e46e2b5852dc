//! 目录服务：租户开通、用户、学生与家长关联

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::bootstrap::{BootstrapReport, Bootstrapper};
use crate::{
    auth::PasswordHasher,
    config::SecurityConfig,
    error::{AppError, Result},
    models::directory::*,
    repository::{DirectoryRepository, RoleRepository},
};

/// System role granted to a tenant's first account
pub const ADMINISTRATOR_ROLE: &str = "Administrator";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedTenant {
    pub tenant: Tenant,
    pub admin: UserResponse,
    pub bootstrap: BootstrapReport,
}

pub struct DirectoryService {
    directory: Arc<dyn DirectoryRepository>,
    roles: Arc<dyn RoleRepository>,
    hasher: Arc<PasswordHasher>,
    policy: SecurityConfig,
    bootstrapper: Arc<Bootstrapper>,
}

impl DirectoryService {
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        roles: Arc<dyn RoleRepository>,
        hasher: Arc<PasswordHasher>,
        policy: SecurityConfig,
        bootstrapper: Arc<Bootstrapper>,
    ) -> Self {
        Self {
            directory,
            roles,
            hasher,
            policy,
            bootstrapper,
        }
    }

    /// 创建用户并分配角色；角色必须属于同一租户
    pub async fn create_user(&self, tenant_id: Uuid, req: CreateUserRequest) -> Result<UserResponse> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.password, &self.policy)?;

        for role_id in &req.role_ids {
            if self.roles.find_role(tenant_id, *role_id).await?.is_none() {
                return Err(AppError::invalid_field(
                    "roleIds",
                    format!("Unknown role id: {}", role_id),
                ));
            }
        }

        let user = self
            .directory
            .create_user(&NewUser {
                tenant_id,
                email: req.email.trim().to_string(),
                name: req.name.trim().to_string(),
                password_hash: self.hasher.hash(&req.password)?,
            })
            .await?;

        for role_id in &req.role_ids {
            self.roles.assign_user_role(tenant_id, user.id, *role_id).await?;
        }

        tracing::info!(
            tenant_id = %tenant_id,
            user_id = %user.id,
            roles = req.role_ids.len(),
            "User created"
        );
        Ok(user.into())
    }

    pub async fn list_users(&self, tenant_id: Uuid) -> Result<Vec<UserResponse>> {
        let users = self.directory.list_users(tenant_id).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn create_student(&self, tenant_id: Uuid, req: CreateStudentRequest) -> Result<Student> {
        req.validate()?;
        let student = self.directory.create_student(tenant_id, &req).await?;
        tracing::info!(tenant_id = %tenant_id, student_id = %student.id, "Student created");
        Ok(student)
    }

    /// 关联家长；`user_id` 必须是同租户账号
    pub async fn link_parent(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
        req: LinkParentRequest,
    ) -> Result<StudentParent> {
        req.validate()?;
        self.directory
            .find_student(tenant_id, student_id)
            .await?
            .ok_or_else(|| AppError::not_found("Student"))?;

        if let Some(user_id) = req.user_id {
            self.directory
                .find_user(tenant_id, user_id)
                .await?
                .ok_or_else(|| AppError::not_found("User"))?;
        }

        self.directory.link_parent(student_id, &req).await
    }

    pub async fn list_parents(&self, tenant_id: Uuid, student_id: Uuid) -> Result<Vec<StudentParent>> {
        self.directory
            .find_student(tenant_id, student_id)
            .await?
            .ok_or_else(|| AppError::not_found("Student"))?;
        self.directory.list_parents(student_id).await
    }

    /// 开通租户：建租户、同步默认角色、创建持有 Administrator 的首个账号
    pub async fn provision_tenant(&self, req: ProvisionTenantRequest) -> Result<ProvisionedTenant> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.admin_password, &self.policy)?;

        let tenant = self.directory.create_tenant(&req.tenant).await?;
        let bootstrap = self.bootstrapper.run_for_tenant(tenant.id).await;

        let admin_role = self
            .roles
            .find_role_by_name(tenant.id, ADMINISTRATOR_ROLE)
            .await?
            .ok_or_else(|| AppError::internal_error("Administrator role was not seeded"))?;

        let admin = self
            .directory
            .create_user(&NewUser {
                tenant_id: tenant.id,
                email: req.admin_email.trim().to_string(),
                name: req.admin_name.trim().to_string(),
                password_hash: self.hasher.hash(&req.admin_password)?,
            })
            .await?;
        self.roles
            .assign_user_role(tenant.id, admin.id, admin_role.id)
            .await?;

        tracing::info!(
            tenant_id = %tenant.id,
            domain = %tenant.domain,
            admin_id = %admin.id,
            "Tenant provisioned"
        );

        Ok(ProvisionedTenant {
            tenant,
            admin: admin.into(),
            bootstrap,
        })
    }
}
