//! 权限目录与默认角色初始化
//!
//! 所有种子数据来自一份声明式清单（内置 `bootstrap/manifest.json`，或
//! `bootstrap.manifest_path` 指定的文件），由 [`Bootstrapper`] 幂等地写入。
//! 单条失败只记录日志，不中断其余条目。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::permission_service::PermissionService;
use crate::{
    error::{AppError, Result},
    models::role::{parse_permission_name, permission_name},
    repository::DirectoryRepository,
};

const BUILTIN_MANIFEST: &str = include_str!("../../bootstrap/manifest.json");

/// Grants every permission in the manifest
pub const ALL_PERMISSIONS: &str = "*";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSpec {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl PermissionSpec {
    pub fn name(&self) -> String {
        permission_name(&self.resource, &self.action)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_system: bool,
    /// Permission names, or `"*"` for the whole catalog
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Declarative permission catalog plus per-tenant default roles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapManifest {
    pub permissions: Vec<PermissionSpec>,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
}

impl BootstrapManifest {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_MANIFEST)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(json)
            .map_err(|e| AppError::Config(format!("Invalid bootstrap manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Cannot read manifest {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// 内置清单或配置指定的文件
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) if !path.trim().is_empty() => Self::from_file(path),
            _ => Self::builtin(),
        }
    }

    /// 权限名合法、无重复，角色只引用清单内的权限
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for spec in &self.permissions {
            let name = spec.name();
            if parse_permission_name(&name).is_none() {
                return Err(AppError::Config(format!("Invalid permission name '{}'", name)));
            }
            if !names.insert(name.clone()) {
                return Err(AppError::Config(format!("Duplicate permission '{}'", name)));
            }
        }

        let mut role_names = HashSet::new();
        for role in &self.roles {
            if role.name.trim().is_empty() || !role_names.insert(role.name.as_str()) {
                return Err(AppError::Config(format!("Invalid or duplicate role '{}'", role.name)));
            }
            if let Some(unknown) = role
                .permissions
                .iter()
                .find(|p| p.as_str() != ALL_PERMISSIONS && !names.contains(p.as_str()))
            {
                return Err(AppError::Config(format!(
                    "Role '{}' references unknown permission '{}'",
                    role.name, unknown
                )));
            }
        }

        Ok(())
    }

    /// 展开 `*` 后的角色权限名
    pub fn role_permission_names(&self, role: &RoleSpec) -> Vec<String> {
        if role.permissions.iter().any(|p| p == ALL_PERMISSIONS) {
            self.permissions.iter().map(PermissionSpec::name).collect()
        } else {
            role.permissions.clone()
        }
    }
}

/// Counters returned by every bootstrap run
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub permissions_created: usize,
    pub permissions_existing: usize,
    pub roles_created: usize,
    pub roles_existing: usize,
    pub grants_created: usize,
    pub grants_existing: usize,
    pub skipped: Vec<String>,
    pub failed: usize,
}

impl BootstrapReport {
    pub fn merge(&mut self, other: BootstrapReport) {
        self.permissions_created += other.permissions_created;
        self.permissions_existing += other.permissions_existing;
        self.roles_created += other.roles_created;
        self.roles_existing += other.roles_existing;
        self.grants_created += other.grants_created;
        self.grants_existing += other.grants_existing;
        self.skipped.extend(other.skipped);
        self.failed += other.failed;
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped.is_empty()
    }
}

pub struct Bootstrapper {
    permissions: Arc<PermissionService>,
    directory: Arc<dyn DirectoryRepository>,
    manifest: Arc<BootstrapManifest>,
}

impl Bootstrapper {
    pub fn new(
        permissions: Arc<PermissionService>,
        directory: Arc<dyn DirectoryRepository>,
        manifest: BootstrapManifest,
    ) -> Self {
        Self {
            permissions,
            directory,
            manifest: Arc::new(manifest),
        }
    }

    pub fn manifest(&self) -> &BootstrapManifest {
        &self.manifest
    }

    /// 同步全局权限目录
    pub async fn run_global(&self) -> BootstrapReport {
        let mut report = BootstrapReport::default();

        for spec in &self.manifest.permissions {
            match self
                .permissions
                .ensure_permission(&spec.resource, &spec.action, spec.description.as_deref())
                .await
            {
                Ok(result) if result.created => report.permissions_created += 1,
                Ok(_) => report.permissions_existing += 1,
                Err(e) => {
                    tracing::error!(permission = %spec.name(), error = %e, "Failed to seed permission");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            created = report.permissions_created,
            existing = report.permissions_existing,
            failed = report.failed,
            "Permission catalog synchronized"
        );
        report
    }

    /// 确保租户的默认角色存在
    ///
    /// 系统角色每次都补齐清单中的权限；可编辑角色只在首次创建时授予，
    /// 之后由租户管理员维护。
    pub async fn run_for_tenant(&self, tenant_id: Uuid) -> BootstrapReport {
        let mut report = BootstrapReport::default();

        for spec in &self.manifest.roles {
            let role = match self
                .permissions
                .ensure_role(tenant_id, &spec.name, spec.description.as_deref(), spec.is_system)
                .await
            {
                Ok(role) => role,
                Err(e) => {
                    tracing::error!(tenant_id = %tenant_id, role = %spec.name, error = %e, "Failed to seed role");
                    report.failed += 1;
                    continue;
                }
            };

            if role.created {
                report.roles_created += 1;
            } else {
                report.roles_existing += 1;
            }

            if !role.created && !role.value.is_system {
                continue;
            }

            let names = self.manifest.role_permission_names(spec);
            let outcome = self
                .permissions
                .assign_permissions_to_role(role.value.id, &names)
                .await;
            report.grants_created += outcome.assigned;
            report.grants_existing += outcome.already_present;
            report.failed += outcome.failed;
            report
                .skipped
                .extend(outcome.skipped.into_iter().map(|n| format!("{}:{}", spec.name, n)));
        }

        tracing::info!(
            tenant_id = %tenant_id,
            roles_created = report.roles_created,
            grants_created = report.grants_created,
            failed = report.failed,
            "Tenant roles synchronized"
        );
        report
    }

    /// 全局目录 + 所有已存在租户
    pub async fn run_all(&self) -> Result<BootstrapReport> {
        let mut report = self.run_global().await;
        for tenant in self.directory.list_tenants().await? {
            report.merge(self.run_for_tenant(tenant.id).await);
        }
        Ok(report)
    }
}
