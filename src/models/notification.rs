//! Notification domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain event that produced a notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    LeaveRequest,
    LeaveApproved,
    LeaveRejected,
    AttendanceAlert,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::LeaveRequest => "LEAVE_REQUEST",
            NotificationType::LeaveApproved => "LEAVE_APPROVED",
            NotificationType::LeaveRejected => "LEAVE_REJECTED",
            NotificationType::AttendanceAlert => "ATTENDANCE_ALERT",
        }
    }
}

impl TryFrom<String> for NotificationType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "LEAVE_REQUEST" => Ok(NotificationType::LeaveRequest),
            "LEAVE_APPROVED" => Ok(NotificationType::LeaveApproved),
            "LEAVE_REJECTED" => Ok(NotificationType::LeaveRejected),
            "ATTENDANCE_ALERT" => Ok(NotificationType::AttendanceAlert),
            other => Err(format!("unknown notification type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Normal,
    High,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Normal => "NORMAL",
            NotificationPriority::High => "HIGH",
        }
    }
}

impl TryFrom<String> for NotificationPriority {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "NORMAL" => Ok(NotificationPriority::Normal),
            "HIGH" => Ok(NotificationPriority::High),
            other => Err(format!("unknown notification priority: {}", other)),
        }
    }
}

/// Per-user notification row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    #[sqlx(try_from = "String")]
    pub priority: NotificationPriority,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub priority: NotificationPriority,
}

impl NewNotification {
    pub fn into_notification(self) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            data: self.data,
            priority: self.priority,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            unread_only: false,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> i64 {
    50
}

/// Listing returned to the recipient
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub data: Vec<Notification>,
    pub unread_count: i64,
}
