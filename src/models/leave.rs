//! Leave request models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "PENDING",
            LeaveStatus::Approved => "APPROVED",
            LeaveStatus::Rejected => "REJECTED",
        }
    }
}

impl TryFrom<String> for LeaveStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "PENDING" => Ok(LeaveStatus::Pending),
            "APPROVED" => Ok(LeaveStatus::Approved),
            "REJECTED" => Ok(LeaveStatus::Rejected),
            other => Err(format!("unknown leave status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub requester_id: Uuid,
    pub student_id: Option<Uuid>,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub is_emergency: bool,
    #[sqlx(try_from = "String")]
    pub status: LeaveStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_leave_dates", skip_on_field_errors = false))]
pub struct CreateLeaveRequest {
    pub student_id: Option<Uuid>,
    #[validate(length(min = 1, max = 50, message = "is required"))]
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(length(min = 1, max = 2000, message = "is required"))]
    pub reason: String,
    #[serde(default)]
    pub is_emergency: bool,
}

fn validate_leave_dates(req: &CreateLeaveRequest) -> Result<(), ValidationError> {
    if req.end_date < req.start_date {
        let mut err = ValidationError::new("date_range");
        err.message = Some("endDate must not be before startDate".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLeaveRequest {
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}
