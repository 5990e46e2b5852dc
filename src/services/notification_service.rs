//! 通知服务：由领域事件生成按用户的通知，并提供收件人的读取接口
//!
//! 通知是业务操作的附带效果，写入失败只记录日志与指标，从不向调用方传播。

use chrono::NaiveDate;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        attendance::AttendanceStatus,
        directory::{Student, StudentParent},
        leave::LeaveRequest,
        notification::*,
    },
    repository::{DirectoryRepository, NotificationRepository},
};

/// Leave lifecycle transitions that notify the requester
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveEvent {
    Submitted,
    Approved,
    Rejected,
}

impl LeaveEvent {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            LeaveEvent::Submitted => NotificationType::LeaveRequest,
            LeaveEvent::Approved => NotificationType::LeaveApproved,
            LeaveEvent::Rejected => NotificationType::LeaveRejected,
        }
    }

    fn template(&self, leave: &LeaveRequest) -> (String, String) {
        let range = format!("{} to {}", leave.start_date, leave.end_date);
        match self {
            LeaveEvent::Submitted => (
                "Leave request submitted".to_string(),
                format!("Your {} leave request for {} is pending review.", leave.leave_type, range),
            ),
            LeaveEvent::Approved => (
                "Leave request approved".to_string(),
                format!("Your {} leave request for {} has been approved.", leave.leave_type, range),
            ),
            LeaveEvent::Rejected => (
                "Leave request rejected".to_string(),
                format!("Your {} leave request for {} has been rejected.", leave.leave_type, range),
            ),
        }
    }
}

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    directory: Arc<dyn DirectoryRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, directory: Arc<dyn DirectoryRepository>) -> Self {
        Self { repo, directory }
    }

    /// 单条写入，失败吞掉
    async fn deliver(&self, notification: NewNotification) -> bool {
        let notification = notification.into_notification();
        match self.repo.insert(&notification).await {
            Ok(()) => true,
            Err(e) => {
                metrics::counter!("notification_failures_total").increment(1);
                tracing::error!(
                    tenant_id = %notification.tenant_id,
                    user_id = %notification.user_id,
                    kind = notification.kind.as_str(),
                    error = %e,
                    "Failed to create notification"
                );
                false
            }
        }
    }

    /// 请假事件：通知申请人，紧急请假为 HIGH
    pub async fn notify_leave_event(&self, leave: &LeaveRequest, event: LeaveEvent) -> bool {
        let (title, message) = event.template(leave);
        let priority = if leave.is_emergency {
            NotificationPriority::High
        } else {
            NotificationPriority::Normal
        };

        self.deliver(NewNotification {
            tenant_id: leave.tenant_id,
            user_id: leave.requester_id,
            kind: event.notification_type(),
            title,
            message,
            data: json!({
                "leaveRequestId": leave.id,
                "status": leave.status,
                "isEmergency": leave.is_emergency,
            }),
            priority,
        })
        .await
    }

    /// 考勤提醒：通知所有有账号的家长，ABSENT 为 HIGH；返回成功条数
    pub async fn notify_attendance_alert(
        &self,
        student: &Student,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> usize {
        let parents = match self.directory.list_parents(student.id).await {
            Ok(parents) => parents,
            Err(e) => {
                metrics::counter!("notification_failures_total").increment(1);
                tracing::error!(student_id = %student.id, error = %e, "Failed to load parents for attendance alert");
                return 0;
            }
        };

        let priority = if status == AttendanceStatus::Absent {
            NotificationPriority::High
        } else {
            NotificationPriority::Normal
        };

        let deliveries = parents
            .iter()
            .filter_map(|parent: &StudentParent| parent.user_id)
            .map(|user_id| {
                self.deliver(NewNotification {
                    tenant_id: student.tenant_id,
                    user_id,
                    kind: NotificationType::AttendanceAlert,
                    title: format!("Attendance alert for {}", student.name),
                    message: format!(
                        "{} was marked {} on {}.",
                        student.name,
                        status.as_str().to_lowercase(),
                        date
                    ),
                    data: json!({
                        "studentId": student.id,
                        "date": date,
                        "status": status,
                    }),
                    priority,
                })
            });

        let delivered = join_all(deliveries).await.into_iter().filter(|ok| *ok).count();
        tracing::debug!(student_id = %student.id, delivered, "Attendance alert dispatched");
        delivered
    }

    pub async fn list(&self, tenant_id: Uuid, user_id: Uuid, query: &NotificationQuery) -> Result<NotificationPage> {
        let query = NotificationQuery {
            limit: query.limit.clamp(1, 200),
            offset: query.offset.max(0),
            ..query.clone()
        };
        let data = self.repo.list_for_user(tenant_id, user_id, &query).await?;
        let unread_count = self.repo.unread_count(tenant_id, user_id).await?;
        Ok(NotificationPage { data, unread_count })
    }

    pub async fn unread_count(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64> {
        self.repo.unread_count(tenant_id, user_id).await
    }

    pub async fn mark_read(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> Result<Notification> {
        self.repo
            .mark_read(tenant_id, user_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Notification"))
    }

    pub async fn mark_all_read(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64> {
        self.repo.mark_all_read(tenant_id, user_id).await
    }

    pub async fn delete(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> Result<()> {
        if !self.repo.delete(tenant_id, user_id, id).await? {
            return Err(AppError::not_found("Notification"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::directory::{CreateStudentRequest, LinkParentRequest};
    use crate::models::leave::LeaveStatus;
    use crate::repository::MemoryStore;
    use chrono::Utc;

    fn service() -> (NotificationService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (NotificationService::new(store.clone(), store.clone()), store)
    }

    fn leave(is_emergency: bool) -> LeaveRequest {
        LeaveRequest {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            student_id: None,
            leave_type: "SICK".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            reason: "flu".to_string(),
            is_emergency,
            status: LeaveStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_comment: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_leave_priority_follows_emergency_flag() {
        let (svc, store) = service();
        let urgent = leave(true);
        let routine = leave(false);

        assert!(svc.notify_leave_event(&urgent, LeaveEvent::Submitted).await);
        assert!(svc.notify_leave_event(&routine, LeaveEvent::Approved).await);

        let all = store.all_notifications().await;
        let to_urgent = all.iter().find(|n| n.user_id == urgent.requester_id).unwrap();
        assert_eq!(to_urgent.priority, NotificationPriority::High);
        assert_eq!(to_urgent.kind, NotificationType::LeaveRequest);
        assert_eq!(to_urgent.data["leaveRequestId"], json!(urgent.id));

        let to_routine = all.iter().find(|n| n.user_id == routine.requester_id).unwrap();
        assert_eq!(to_routine.priority, NotificationPriority::Normal);
        assert_eq!(to_routine.kind, NotificationType::LeaveApproved);
    }

    #[tokio::test]
    async fn test_insert_failure_is_swallowed() {
        let (svc, store) = service();
        store.set_fail_notification_writes(true);
        assert!(!svc.notify_leave_event(&leave(false), LeaveEvent::Rejected).await);
        assert!(store.all_notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_attendance_alert_reaches_parents_with_accounts() {
        let (svc, store) = service();
        let tenant = Uuid::new_v4();
        let directory: Arc<dyn DirectoryRepository> = store.clone();
        let student = directory
            .create_student(
                tenant,
                &CreateStudentRequest {
                    name: "Sam".to_string(),
                    class_name: Some("5A".to_string()),
                },
            )
            .await
            .unwrap();

        let mother = Uuid::new_v4();
        let father = Uuid::new_v4();
        for (name, user_id) in [("Mum", Some(mother)), ("Dad", Some(father)), ("Gran", None)] {
            directory
                .link_parent(
                    student.id,
                    &LinkParentRequest {
                        name: name.to_string(),
                        relationship: "guardian".to_string(),
                        user_id,
                    },
                )
                .await
                .unwrap();
        }

        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(svc.notify_attendance_alert(&student, date, AttendanceStatus::Absent).await, 2);
        assert_eq!(svc.notify_attendance_alert(&student, date, AttendanceStatus::Late).await, 2);

        let all = store.all_notifications().await;
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|n| n.user_id == mother || n.user_id == father));
        assert_eq!(
            all.iter().filter(|n| n.priority == NotificationPriority::High).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_recipient_only_access() {
        let (svc, _) = service();
        let request = leave(false);
        svc.notify_leave_event(&request, LeaveEvent::Submitted).await;

        let page = svc
            .list(request.tenant_id, request.requester_id, &NotificationQuery::default())
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.unread_count, 1);
        let id = page.data[0].id;

        let stranger = Uuid::new_v4();
        assert!(matches!(
            svc.mark_read(request.tenant_id, stranger, id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(svc.delete(request.tenant_id, stranger, id).await.is_err());

        let read = svc.mark_read(request.tenant_id, request.requester_id, id).await.unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());
        assert_eq!(svc.unread_count(request.tenant_id, request.requester_id).await.unwrap(), 0);

        svc.delete(request.tenant_id, request.requester_id, id).await.unwrap();
        let page = svc
            .list(request.tenant_id, request.requester_id, &NotificationQuery::default())
            .await
            .unwrap();
        assert!(page.data.is_empty());
    }
}
