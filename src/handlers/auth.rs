//! 认证处理器

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::{
    auth::AuthContext,
    error::Result,
    middleware::AppState,
    models::auth::LoginRequest,
};

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let response = state.auth_service.login(req).await?;
    Ok(Json(json!({ "success": true, "data": response })))
}

/// 当前用户信息（含有效权限）
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<impl IntoResponse> {
    let me = state.auth_service.me(auth).await?;
    Ok(Json(json!({ "success": true, "data": me })))
}
