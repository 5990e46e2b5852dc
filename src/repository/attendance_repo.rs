//! Attendance repository

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::AttendanceRepository;
use crate::{error::Result, models::attendance::*};

pub struct PgAttendanceRepository {
    db: PgPool,
}

impl PgAttendanceRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AttendanceRepository for PgAttendanceRepository {
    async fn upsert(
        &self,
        tenant_id: Uuid,
        marked_by: Uuid,
        req: &MarkAttendanceRequest,
    ) -> Result<AttendanceRecord> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            INSERT INTO attendance (id, tenant_id, student_id, date, status, remarks, marked_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (student_id, date) DO UPDATE
            SET status = EXCLUDED.status,
                remarks = EXCLUDED.remarks,
                marked_by = EXCLUDED.marked_by,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(req.student_id)
        .bind(req.date)
        .bind(req.status.as_str())
        .bind(&req.remarks)
        .bind(marked_by)
        .fetch_one(&self.db)
        .await?;

        Ok(record)
    }

    async fn list(&self, tenant_id: Uuid, query: &AttendanceQuery) -> Result<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT * FROM attendance
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR student_id = $2)
              AND ($3::date IS NULL OR date = $3)
            ORDER BY date DESC, student_id
            "#,
        )
        .bind(tenant_id)
        .bind(query.student_id)
        .bind(query.date)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }
}
