//! 考勤服务：每个学生每天一条记录，缺勤/迟到时提醒家长

use std::sync::Arc;

use super::notification_service::NotificationService;
use crate::{
    auth::AuthContext,
    error::{AppError, Result},
    models::attendance::*,
    repository::{AttendanceRepository, DirectoryRepository},
};

pub struct AttendanceService {
    repo: Arc<dyn AttendanceRepository>,
    directory: Arc<dyn DirectoryRepository>,
    notifications: Arc<NotificationService>,
}

impl AttendanceService {
    pub fn new(
        repo: Arc<dyn AttendanceRepository>,
        directory: Arc<dyn DirectoryRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            repo,
            directory,
            notifications,
        }
    }

    /// 记录考勤（同一学生同一天覆盖），返回记录与通知到的家长数
    pub async fn mark(&self, ctx: &AuthContext, req: MarkAttendanceRequest) -> Result<(AttendanceRecord, usize)> {
        let student = self
            .directory
            .find_student(ctx.tenant_id, req.student_id)
            .await?
            .ok_or_else(|| AppError::not_found("Student"))?;

        let record = self.repo.upsert(ctx.tenant_id, ctx.user_id, &req).await?;
        tracing::info!(
            tenant_id = %ctx.tenant_id,
            student_id = %student.id,
            date = %record.date,
            status = record.status.as_str(),
            "Attendance marked"
        );

        let notified = if record.status.raises_alert() {
            self.notifications
                .notify_attendance_alert(&student, record.date, record.status)
                .await
        } else {
            0
        };

        Ok((record, notified))
    }

    pub async fn list(&self, ctx: &AuthContext, query: &AttendanceQuery) -> Result<Vec<AttendanceRecord>> {
        self.repo.list(ctx.tenant_id, query).await
    }
}
