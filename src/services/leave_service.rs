//! 请假申请服务
//!
//! 状态只允许 PENDING -> APPROVED / REJECTED，每次流转通知申请人。

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::notification_service::{LeaveEvent, NotificationService};
use super::permission_service::PermissionService;
use crate::{
    auth::AuthContext,
    error::{AppError, Result},
    models::leave::*,
    repository::{DirectoryRepository, LeaveRepository},
};

/// Grants visibility of every request in the tenant
pub const LEAVE_MANAGE: &str = "leave:manage";

pub struct LeaveService {
    repo: Arc<dyn LeaveRepository>,
    directory: Arc<dyn DirectoryRepository>,
    permissions: Arc<PermissionService>,
    notifications: Arc<NotificationService>,
}

impl LeaveService {
    pub fn new(
        repo: Arc<dyn LeaveRepository>,
        directory: Arc<dyn DirectoryRepository>,
        permissions: Arc<PermissionService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            repo,
            directory,
            permissions,
            notifications,
        }
    }

    async fn can_manage(&self, ctx: &AuthContext) -> Result<bool> {
        let granted = self
            .permissions
            .effective_permissions(ctx.tenant_id, ctx.user_id)
            .await?;
        Ok(granted.contains(LEAVE_MANAGE))
    }

    /// 提交请假申请
    pub async fn create(&self, ctx: &AuthContext, req: CreateLeaveRequest) -> Result<LeaveRequest> {
        req.validate()?;

        if let Some(student_id) = req.student_id {
            self.directory
                .find_student(ctx.tenant_id, student_id)
                .await?
                .ok_or_else(|| AppError::not_found("Student"))?;
        }

        let leave = self.repo.create(ctx.tenant_id, ctx.user_id, &req).await?;
        tracing::info!(
            tenant_id = %ctx.tenant_id,
            leave_id = %leave.id,
            requester_id = %ctx.user_id,
            is_emergency = leave.is_emergency,
            "Leave request submitted"
        );

        self.notifications
            .notify_leave_event(&leave, LeaveEvent::Submitted)
            .await;
        Ok(leave)
    }

    /// 自己的申请；持有 leave:manage 时返回租户内全部
    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<LeaveRequest>> {
        let requester = if self.can_manage(ctx).await? {
            None
        } else {
            Some(ctx.user_id)
        };
        self.repo.list(ctx.tenant_id, requester).await
    }

    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> Result<LeaveRequest> {
        let leave = self
            .repo
            .find(ctx.tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Leave request"))?;

        if leave.requester_id != ctx.user_id && !self.can_manage(ctx).await? {
            return Err(AppError::denied(LEAVE_MANAGE));
        }
        Ok(leave)
    }

    pub async fn approve(&self, ctx: &AuthContext, id: Uuid, req: ReviewLeaveRequest) -> Result<LeaveRequest> {
        self.review(ctx, id, LeaveStatus::Approved, req).await
    }

    pub async fn reject(&self, ctx: &AuthContext, id: Uuid, req: ReviewLeaveRequest) -> Result<LeaveRequest> {
        self.review(ctx, id, LeaveStatus::Rejected, req).await
    }

    async fn review(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        status: LeaveStatus,
        req: ReviewLeaveRequest,
    ) -> Result<LeaveRequest> {
        req.validate()?;

        let existing = self
            .repo
            .find(ctx.tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Leave request"))?;
        if existing.status != LeaveStatus::Pending {
            return Err(AppError::conflict(format!(
                "Leave request is already {}",
                existing.status.as_str()
            )));
        }

        // 条件更新，并发审批时只有一个成功
        let leave = self
            .repo
            .review(ctx.tenant_id, id, status, ctx.user_id, req.comment.as_deref())
            .await?
            .ok_or_else(|| AppError::conflict("Leave request is no longer pending"))?;

        tracing::info!(
            tenant_id = %ctx.tenant_id,
            leave_id = %leave.id,
            reviewer_id = %ctx.user_id,
            status = leave.status.as_str(),
            "Leave request reviewed"
        );

        let event = match status {
            LeaveStatus::Approved => LeaveEvent::Approved,
            _ => LeaveEvent::Rejected,
        };
        self.notifications.notify_leave_event(&leave, event).await;
        Ok(leave)
    }
}
