//! Attendance models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Late => "LATE",
            AttendanceStatus::Excused => "EXCUSED",
        }
    }

    /// Statuses that notify the student's parents
    pub fn raises_alert(&self) -> bool {
        matches!(self, AttendanceStatus::Absent | AttendanceStatus::Late)
    }
}

impl TryFrom<String> for AttendanceStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "PRESENT" => Ok(AttendanceStatus::Present),
            "ABSENT" => Ok(AttendanceStatus::Absent),
            "LATE" => Ok(AttendanceStatus::Late),
            "EXCUSED" => Ok(AttendanceStatus::Excused),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub marked_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceRequest {
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub student_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}
