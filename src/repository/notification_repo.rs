//! Notification repository (通知数据访问)
//!
//! 所有读写都同时按 tenant_id 与收件人 user_id 过滤。

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::NotificationRepository;
use crate::{error::Result, models::notification::*};

pub struct PgNotificationRepository {
    db: PgPool,
}

impl PgNotificationRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, n: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, tenant_id, user_id, type, title, message, data, priority, is_read, read_at,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(n.id)
        .bind(n.tenant_id)
        .bind(n.user_id)
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(&n.data)
        .bind(n.priority.as_str())
        .bind(n.is_read)
        .bind(n.read_at)
        .bind(n.created_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn list_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE tenant_id = $1 AND user_id = $2 AND ($3 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(query.unread_only)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(notifications)
    }

    async fn unread_count(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE tenant_id = $1 AND user_id = $2 AND is_read = FALSE",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    /// 标记已读；已读的通知保持原 read_at
    async fn mark_read(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND tenant_id = $2 AND user_id = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(notification)
    }

    async fn mark_all_read(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW()
            WHERE tenant_id = $1 AND user_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM notifications WHERE id = $1 AND tenant_id = $2 AND user_id = $3")
                .bind(id)
                .bind(tenant_id)
                .bind(user_id)
                .execute(&self.db)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
