//! Directory repository (租户、用户、学生数据访问)

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{map_unique_violation, DirectoryRepository};
use crate::{error::Result, models::directory::*};

pub struct PgDirectoryRepository {
    db: PgPool,
}

impl PgDirectoryRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DirectoryRepository for PgDirectoryRepository {
    // ==================== Tenants ====================

    async fn create_tenant(&self, req: &CreateTenantRequest) -> Result<Tenant> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (id, name, domain, email)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(req.domain.to_lowercase())
        .bind(req.email.to_lowercase())
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "Tenant with this domain or email already exists"))?;

        Ok(tenant)
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(tenant)
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let tenants = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY created_at")
            .fetch_all(&self.db)
            .await?;

        Ok(tenants)
    }

    // ==================== Users ====================

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, tenant_id, email, name, password_hash, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.tenant_id)
        .bind(user.email.to_lowercase())
        .bind(&user.name)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "User with this email already exists"))?;

        Ok(created)
    }

    async fn find_user(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 邮箱不区分大小写
    async fn find_user_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE tenant_id = $1 AND email = $2")
                .bind(tenant_id)
                .bind(email.to_lowercase())
                .fetch_optional(&self.db)
                .await?;

        Ok(user)
    }

    async fn list_users(&self, tenant_id: Uuid) -> Result<Vec<User>> {
        let users =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE tenant_id = $1 ORDER BY email")
                .bind(tenant_id)
                .fetch_all(&self.db)
                .await?;

        Ok(users)
    }

    // ==================== Students ====================

    async fn create_student(&self, tenant_id: Uuid, req: &CreateStudentRequest) -> Result<Student> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (id, tenant_id, name, class_name)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&req.name)
        .bind(&req.class_name)
        .fetch_one(&self.db)
        .await?;

        Ok(student)
    }

    async fn find_student(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Student>> {
        let student =
            sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1 AND tenant_id = $2")
                .bind(id)
                .bind(tenant_id)
                .fetch_optional(&self.db)
                .await?;

        Ok(student)
    }

    async fn link_parent(&self, student_id: Uuid, req: &LinkParentRequest) -> Result<StudentParent> {
        let parent = sqlx::query_as::<_, StudentParent>(
            r#"
            INSERT INTO student_parents (id, student_id, name, relationship, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(&req.name)
        .bind(&req.relationship)
        .bind(req.user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "This user is already linked to the student"))?;

        Ok(parent)
    }

    async fn list_parents(&self, student_id: Uuid) -> Result<Vec<StudentParent>> {
        let parents = sqlx::query_as::<_, StudentParent>(
            "SELECT * FROM student_parents WHERE student_id = $1 ORDER BY name",
        )
        .bind(student_id)
        .fetch_all(&self.db)
        .await?;

        Ok(parents)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
