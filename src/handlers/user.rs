//! 用户管理的 HTTP 处理器

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::{
    auth::AuthContext,
    error::Result,
    middleware::AppState,
    models::directory::CreateUserRequest,
};

/// 列出用户
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<impl IntoResponse> {
    let users = state.directory_service.list_users(auth.tenant_id).await?;
    Ok(Json(json!({ "success": true, "data": users, "count": users.len() })))
}

/// 创建用户
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse> {
    let user = state.directory_service.create_user(auth.tenant_id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "User created", "data": user })),
    ))
}
