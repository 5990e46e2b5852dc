//! Audit repository (审计数据访问)
//!
//! 审计表只追加，不提供更新/删除路径。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuditRepository;
use crate::{error::Result, models::audit::*};

pub struct PgAuditRepository {
    db: PgPool,
}

impl PgAuditRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 拼接过滤条件，$1 固定为 tenant_id
    fn filter_clause(filters: &AuditLogFilters) -> (String, usize) {
        let mut clause = String::from(" WHERE tenant_id = $1");
        let mut index = 1;

        if filters.user_id.is_some() {
            index += 1;
            clause.push_str(&format!(" AND user_id = ${}", index));
        }
        if filters.action.is_some() {
            index += 1;
            clause.push_str(&format!(" AND action = ${}", index));
        }
        if filters.resource.is_some() {
            index += 1;
            clause.push_str(&format!(" AND resource = ${}", index));
        }
        if filters.status.is_some() {
            index += 1;
            clause.push_str(&format!(" AND status = ${}", index));
        }
        if filters.start_time.is_some() {
            index += 1;
            clause.push_str(&format!(" AND timestamp >= ${}", index));
        }
        if filters.end_time.is_some() {
            index += 1;
            clause.push_str(&format!(" AND timestamp <= ${}", index));
        }

        (clause, index)
    }

    async fn top_by(
        &self,
        column: &str,
        tenant_id: Uuid,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        top: i64,
    ) -> Result<Vec<AuditCount>> {
        // column 只来自本模块的固定字面量
        let query = format!(
            r#"
            SELECT {column} AS key, COUNT(*) AS count
            FROM audit_logs
            WHERE tenant_id = $1
              AND ($2::timestamptz IS NULL OR timestamp >= $2)
              AND ($3::timestamptz IS NULL OR timestamp <= $3)
            GROUP BY {column}
            ORDER BY count DESC, key
            LIMIT $4
            "#
        );

        let counts = sqlx::query_as::<_, AuditCount>(&query)
            .bind(tenant_id)
            .bind(start_time)
            .bind(end_time)
            .bind(top)
            .fetch_all(&self.db)
            .await?;

        Ok(counts)
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    /// 插入审计日志
    async fn insert(&self, log: &AuditLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, user_id, user_email, user_name, user_roles, tenant_id, action, resource,
                resource_id, details, ip_address, user_agent, timestamp, status, error_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(&log.user_email)
        .bind(&log.user_name)
        .bind(&log.user_roles)
        .bind(log.tenant_id)
        .bind(&log.action)
        .bind(&log.resource)
        .bind(&log.resource_id)
        .bind(&log.details)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(log.timestamp)
        .bind(log.status.as_str())
        .bind(&log.error_message)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 查询审计日志
    async fn query(
        &self,
        tenant_id: Uuid,
        filters: &AuditLogFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>> {
        let (clause, index) = Self::filter_clause(filters);
        let query = format!(
            "SELECT * FROM audit_logs{} ORDER BY timestamp DESC LIMIT ${} OFFSET ${}",
            clause,
            index + 1,
            index + 2
        );

        let mut query_builder = sqlx::query_as::<_, AuditLog>(&query).bind(tenant_id);

        if let Some(user_id) = filters.user_id {
            query_builder = query_builder.bind(user_id);
        }
        if let Some(action) = &filters.action {
            query_builder = query_builder.bind(action);
        }
        if let Some(resource) = &filters.resource {
            query_builder = query_builder.bind(resource);
        }
        if let Some(status) = filters.status {
            query_builder = query_builder.bind(status.as_str());
        }
        if let Some(start_time) = filters.start_time {
            query_builder = query_builder.bind(start_time);
        }
        if let Some(end_time) = filters.end_time {
            query_builder = query_builder.bind(end_time);
        }

        let logs = query_builder
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;

        Ok(logs)
    }

    /// 统计审计日志数量
    async fn count(&self, tenant_id: Uuid, filters: &AuditLogFilters) -> Result<i64> {
        let (clause, _) = Self::filter_clause(filters);
        let query = format!("SELECT COUNT(*) FROM audit_logs{}", clause);

        let mut query_builder = sqlx::query_scalar::<_, i64>(&query).bind(tenant_id);

        if let Some(user_id) = filters.user_id {
            query_builder = query_builder.bind(user_id);
        }
        if let Some(action) = &filters.action {
            query_builder = query_builder.bind(action);
        }
        if let Some(resource) = &filters.resource {
            query_builder = query_builder.bind(resource);
        }
        if let Some(status) = filters.status {
            query_builder = query_builder.bind(status.as_str());
        }
        if let Some(start_time) = filters.start_time {
            query_builder = query_builder.bind(start_time);
        }
        if let Some(end_time) = filters.end_time {
            query_builder = query_builder.bind(end_time);
        }

        let count = query_builder.fetch_one(&self.db).await?;
        Ok(count)
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<AuditLog>> {
        let log = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(log)
    }

    async fn stats(
        &self,
        tenant_id: Uuid,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        top: i64,
    ) -> Result<AuditStats> {
        let (total, success, failure): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'SUCCESS'),
                COUNT(*) FILTER (WHERE status = 'FAILURE')
            FROM audit_logs
            WHERE tenant_id = $1
              AND ($2::timestamptz IS NULL OR timestamp >= $2)
              AND ($3::timestamptz IS NULL OR timestamp <= $3)
            "#,
        )
        .bind(tenant_id)
        .bind(start_time)
        .bind(end_time)
        .fetch_one(&self.db)
        .await?;

        let top_actions = self.top_by("action", tenant_id, start_time, end_time, top).await?;
        let top_resources = self
            .top_by("resource", tenant_id, start_time, end_time, top)
            .await?;

        Ok(AuditStats {
            total,
            success,
            failure,
            top_actions,
            top_resources,
        })
    }
}
