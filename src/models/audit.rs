//! Audit domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome recorded on an audit row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failure,
    Pending,
}

impl AuditStatus {
    /// 2xx is a success, everything else a failure
    pub fn from_http_status(code: u16) -> Self {
        if (200..300).contains(&code) {
            AuditStatus::Success
        } else {
            AuditStatus::Failure
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "SUCCESS",
            AuditStatus::Failure => "FAILURE",
            AuditStatus::Pending => "PENDING",
        }
    }
}

impl TryFrom<String> for AuditStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "SUCCESS" => Ok(AuditStatus::Success),
            "FAILURE" => Ok(AuditStatus::Failure),
            "PENDING" => Ok(AuditStatus::Pending),
            other => Err(format!("unknown audit status: {}", other)),
        }
    }
}

/// Audit log entry (append only)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub user_roles: Vec<String>,
    pub tenant_id: Option<Uuid>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: AuditStatus,
    pub error_message: Option<String>,
}

/// Insert payload; id and timestamp are assigned on write
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub user_roles: Vec<String>,
    pub tenant_id: Option<Uuid>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
}

impl NewAuditLog {
    pub fn into_log(self) -> AuditLog {
        AuditLog {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            user_email: self.user_email,
            user_name: self.user_name,
            user_roles: self.user_roles,
            tenant_id: self.tenant_id,
            action: self.action,
            resource: self.resource,
            resource_id: self.resource_id,
            details: self.details,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            timestamp: Utc::now(),
            status: self.status,
            error_message: self.error_message,
        }
    }
}

/// Audit log filters (always combined with the caller's tenant)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogFilters {
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub status: Option<AuditStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl AuditLogFilters {
    pub fn matches(&self, log: &AuditLog) -> bool {
        self.user_id.map_or(true, |id| log.user_id == Some(id))
            && self.action.as_deref().map_or(true, |a| log.action == a)
            && self.resource.as_deref().map_or(true, |r| log.resource == r)
            && self.status.map_or(true, |s| log.status == s)
            && self.start_time.map_or(true, |t| log.timestamp >= t)
            && self.end_time.map_or(true, |t| log.timestamp <= t)
    }
}

/// Query string of the audit listing endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub status: Option<AuditStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditLogQuery {
    pub fn filters(&self) -> AuditLogFilters {
        AuditLogFilters {
            user_id: self.user_id,
            action: self.action.clone(),
            resource: self.resource.clone(),
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Time window of the statistics endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStatsQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// One page of audit rows plus the unpaginated total
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPage {
    pub data: Vec<AuditLog>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Count bucket used by the statistics endpoint
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditCount {
    pub key: String,
    pub count: i64,
}

/// Audit statistics for one tenant
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total: i64,
    pub success: i64,
    pub failure: i64,
    pub top_actions: Vec<AuditCount>,
    pub top_resources: Vec<AuditCount>,
}
