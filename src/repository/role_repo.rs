//! Role repository (角色与权限数据访问)

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{map_unique_violation, RoleRepository, Upserted};
use crate::{
    error::{AppError, Result},
    models::role::*,
};

pub struct PgRoleRepository {
    db: PgPool,
}

impl PgRoleRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 在事务内锁定角色行，系统角色直接拒绝
    async fn lock_mutable_role(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> Result<Role> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT * FROM roles WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(role_id)
        .bind(tenant_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Role"))?;

        if role.is_system {
            return Err(AppError::SystemRoleProtected(role.name));
        }

        Ok(role)
    }

    async fn insert_role_permissions(
        tx: &mut Transaction<'_, Postgres>,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<()> {
        if permission_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    // ==================== Permissions ====================

    /// 按 name 幂等插入；已存在时不覆盖描述
    async fn ensure_permission(
        &self,
        resource: &str,
        action: &str,
        description: Option<&str>,
    ) -> Result<Upserted<Permission>> {
        let name = permission_name(resource, action);

        let inserted = sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (id, resource, action, name, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resource)
        .bind(action)
        .bind(&name)
        .bind(description)
        .fetch_optional(&self.db)
        .await?;

        if let Some(permission) = inserted {
            return Ok(Upserted {
                value: permission,
                created: true,
            });
        }

        let existing = self
            .find_permission_by_name(&name)
            .await?
            .ok_or_else(|| AppError::internal_error(format!("permission {} vanished", name)))?;

        Ok(Upserted {
            value: existing,
            created: false,
        })
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;

        Ok(permission)
    }

    async fn find_permissions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Permission>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE id = ANY($1) ORDER BY resource, action",
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }

    /// 列出所有权限
    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let permissions =
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions ORDER BY resource, action")
                .fetch_all(&self.db)
                .await?;

        Ok(permissions)
    }

    async fn count_permissions(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    // ==================== Roles ====================

    async fn ensure_role(
        &self,
        tenant_id: Uuid,
        name: &str,
        description: Option<&str>,
        is_system: bool,
    ) -> Result<Upserted<Role>> {
        let inserted = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (id, tenant_id, name, description, is_system)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id, name) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(name)
        .bind(description)
        .bind(is_system)
        .fetch_optional(&self.db)
        .await?;

        if let Some(role) = inserted {
            return Ok(Upserted {
                value: role,
                created: true,
            });
        }

        let existing = self
            .find_role_by_name(tenant_id, name)
            .await?
            .ok_or_else(|| AppError::internal_error(format!("role {} vanished", name)))?;

        Ok(Upserted {
            value: existing,
            created: false,
        })
    }

    /// 根据 ID 查找角色（限定租户）
    async fn find_role(&self, tenant_id: Uuid, role_id: Uuid) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1 AND tenant_id = $2")
            .bind(role_id)
            .bind(tenant_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(role)
    }

    /// 根据名称查找角色
    async fn find_role_by_name(&self, tenant_id: Uuid, name: &str) -> Result<Option<Role>> {
        let role =
            sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE tenant_id = $1 AND name = $2")
                .bind(tenant_id)
                .bind(name)
                .fetch_optional(&self.db)
                .await?;

        Ok(role)
    }

    /// 列出租户内所有角色
    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<Role>> {
        let roles =
            sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE tenant_id = $1 ORDER BY name")
                .bind(tenant_id)
                .fetch_all(&self.db)
                .await?;

        Ok(roles)
    }

    /// 创建角色及其权限（同一事务）
    async fn create_role(
        &self,
        tenant_id: Uuid,
        name: &str,
        description: Option<&str>,
        permission_ids: &[Uuid],
    ) -> Result<Role> {
        let mut tx = self.db.begin().await?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (id, tenant_id, name, description, is_system)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(name)
        .bind(description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Role with this name already exists"))?;

        Self::insert_role_permissions(&mut tx, role.id, permission_ids).await?;
        tx.commit().await?;

        Ok(role)
    }

    /// 更新角色：改名 + 整体替换权限集合，行锁串行化并发更新
    async fn update_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        name: &str,
        description: Option<&str>,
        permission_ids: &[Uuid],
    ) -> Result<Role> {
        let mut tx = self.db.begin().await?;
        Self::lock_mutable_role(&mut tx, tenant_id, role_id).await?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = $3, description = $4, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(role_id)
        .bind(tenant_id)
        .bind(name)
        .bind(description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Role with this name already exists"))?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        Self::insert_role_permissions(&mut tx, role_id, permission_ids).await?;

        tx.commit().await?;

        Ok(role)
    }

    /// 删除角色；仍有用户持有时返回 RoleInUse
    async fn delete_role(&self, tenant_id: Uuid, role_id: Uuid) -> Result<()> {
        let mut tx = self.db.begin().await?;
        Self::lock_mutable_role(&mut tx, tenant_id, role_id).await?;

        let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_one(&mut *tx)
            .await?;

        if user_count > 0 {
            return Err(AppError::RoleInUse { user_count });
        }

        // role_permissions 通过 ON DELETE CASCADE 一并删除
        sqlx::query("DELETE FROM roles WHERE id = $1 AND tenant_id = $2")
            .bind(role_id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// 获取角色的所有权限
    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.*
            FROM permissions p
            JOIN role_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = $1
            ORDER BY p.resource, p.action
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }

    async fn role_members(&self, role_id: Uuid) -> Result<Vec<RoleMember>> {
        let members = sqlx::query_as::<_, RoleMember>(
            r#"
            SELECT u.id AS user_id, u.email, u.name
            FROM user_roles ur
            JOIN users u ON u.id = ur.user_id
            WHERE ur.role_id = $1
            ORDER BY u.email
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.db)
        .await?;

        Ok(members)
    }

    /// 为角色添加权限
    async fn add_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== User Roles ====================

    /// 为用户分配角色
    async fn assign_user_role(&self, tenant_id: Uuid, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id, tenant_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .bind(tenant_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 撤销用户的角色
    async fn revoke_user_role(&self, tenant_id: Uuid, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2 AND tenant_id = $3",
        )
        .bind(user_id)
        .bind(role_id)
        .bind(tenant_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn user_roles(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.*
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1 AND ur.tenant_id = $2 AND r.tenant_id = $2
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(roles)
    }

    async fn effective_permission_names(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id AND r.tenant_id = ur.tenant_id
            JOIN role_permissions rp ON rp.role_id = r.id
            JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = $1 AND ur.tenant_id = $2
            ORDER BY p.name
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(names)
    }
}
