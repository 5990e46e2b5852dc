//! Leave request repository

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::LeaveRepository;
use crate::{error::Result, models::leave::*};

pub struct PgLeaveRepository {
    db: PgPool,
}

impl PgLeaveRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LeaveRepository for PgLeaveRepository {
    async fn create(
        &self,
        tenant_id: Uuid,
        requester_id: Uuid,
        req: &CreateLeaveRequest,
    ) -> Result<LeaveRequest> {
        let leave = sqlx::query_as::<_, LeaveRequest>(
            r#"
            INSERT INTO leave_requests (
                id, tenant_id, requester_id, student_id, leave_type, start_date, end_date,
                reason, is_emergency, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'PENDING')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(requester_id)
        .bind(req.student_id)
        .bind(&req.leave_type)
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(&req.reason)
        .bind(req.is_emergency)
        .fetch_one(&self.db)
        .await?;

        Ok(leave)
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<LeaveRequest>> {
        let leave = sqlx::query_as::<_, LeaveRequest>(
            "SELECT * FROM leave_requests WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(leave)
    }

    async fn list(&self, tenant_id: Uuid, requester_id: Option<Uuid>) -> Result<Vec<LeaveRequest>> {
        let leaves = sqlx::query_as::<_, LeaveRequest>(
            r#"
            SELECT * FROM leave_requests
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR requester_id = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(requester_id)
        .fetch_all(&self.db)
        .await?;

        Ok(leaves)
    }

    /// 条件更新：只有 PENDING 状态才能被审批
    async fn review(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: LeaveStatus,
        reviewer_id: Uuid,
        comment: Option<&str>,
    ) -> Result<Option<LeaveRequest>> {
        let leave = sqlx::query_as::<_, LeaveRequest>(
            r#"
            UPDATE leave_requests
            SET status = $3, reviewed_by = $4, reviewed_at = NOW(), review_comment = $5
            WHERE id = $1 AND tenant_id = $2 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(status.as_str())
        .bind(reviewer_id)
        .bind(comment)
        .fetch_optional(&self.db)
        .await?;

        Ok(leave)
    }
}
