//! 请假申请处理器

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    error::Result,
    middleware::AppState,
    models::leave::{CreateLeaveRequest, ReviewLeaveRequest},
};

/// 提交请假申请
pub async fn create_leave_request(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(req): Json<CreateLeaveRequest>,
) -> Result<impl IntoResponse> {
    let leave = state.leave_service.create(&auth, req).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": leave }))))
}

pub async fn list_leave_requests(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<impl IntoResponse> {
    let leaves = state.leave_service.list(&auth).await?;
    Ok(Json(json!({ "success": true, "data": leaves })))
}

pub async fn get_leave_request(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let leave = state.leave_service.get(&auth, id).await?;
    Ok(Json(json!({ "success": true, "data": leave })))
}

pub async fn approve_leave_request(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewLeaveRequest>,
) -> Result<impl IntoResponse> {
    let leave = state.leave_service.approve(&auth, id, req).await?;
    Ok(Json(json!({ "success": true, "data": leave })))
}

pub async fn reject_leave_request(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewLeaveRequest>,
) -> Result<impl IntoResponse> {
    let leave = state.leave_service.reject(&auth, id, req).await?;
    Ok(Json(json!({ "success": true, "data": leave })))
}
