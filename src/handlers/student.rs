//! 学生与家长关联处理器

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
    models::directory::{CreateStudentRequest, LinkParentRequest},
};

pub async fn create_student(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(req): Json<CreateStudentRequest>,
) -> Result<impl IntoResponse> {
    let student = state.directory_service.create_student(auth.tenant_id, req).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": student }))))
}

/// 关联家长（`userId` 存在时该家长会收到考勤提醒）
pub async fn link_parent(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(student_id): Path<Uuid>,
    Json(req): Json<LinkParentRequest>,
) -> Result<impl IntoResponse> {
    let parent = state
        .directory_service
        .link_parent(auth.tenant_id, student_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": parent }))))
}

pub async fn list_parents(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(student_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let parents = state
        .directory_service
        .list_parents(auth.tenant_id, student_id)
        .await?;
    Ok(Json(json!({ "success": true, "data": parents })))
}
