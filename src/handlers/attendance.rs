//! 考勤处理器

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    auth::AuthContext,
    error::Result,
    middleware::AppState,
    models::attendance::{AttendanceQuery, MarkAttendanceRequest},
};

/// 记录考勤，返回被通知的家长数
pub async fn mark_attendance(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(req): Json<MarkAttendanceRequest>,
) -> Result<impl IntoResponse> {
    let (record, notified) = state.attendance_service.mark(&auth, req).await?;
    Ok(Json(json!({
        "success": true,
        "data": record,
        "notifiedParents": notified,
    })))
}

pub async fn list_attendance(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Query(query): Query<AttendanceQuery>,
) -> Result<impl IntoResponse> {
    let records = state.attendance_service.list(&auth, &query).await?;
    Ok(Json(json!({ "success": true, "data": records })))
}
