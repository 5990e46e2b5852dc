//! 角色与权限管理处理器

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
    models::role::*,
};

/// 列出租户内的角色
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<impl IntoResponse> {
    let roles = state.role_service.list_roles(auth.tenant_id).await?;
    Ok(Json(json!({ "success": true, "data": roles })))
}

pub async fn get_role(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let role = state.role_service.get_role(auth.tenant_id, id).await?;
    Ok(Json(json!({ "success": true, "data": role })))
}

/// 创建角色
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(req): Json<CreateRoleRequest>,
) -> Result<impl IntoResponse> {
    let role = state.role_service.create_role(auth.tenant_id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Role created", "data": role })),
    ))
}

/// 更新角色（权限整体替换）
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse> {
    let role = state.role_service.update_role(auth.tenant_id, id, req).await?;
    Ok(Json(json!({ "success": true, "message": "Role updated", "data": role })))
}

pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.role_service.delete_role(auth.tenant_id, id).await?;
    Ok(Json(json!({ "success": true, "message": "Role deleted" })))
}

/// 权限目录
pub async fn list_permissions(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let permissions = state.role_service.list_permissions().await?;
    Ok(Json(json!({ "success": true, "data": permissions })))
}

pub async fn list_user_roles(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let roles = state.role_service.user_roles(auth.tenant_id, user_id).await?;
    Ok(Json(json!({ "success": true, "data": roles })))
}

/// 分配角色（幂等）
pub async fn assign_user_role(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> Result<impl IntoResponse> {
    let created = state
        .role_service
        .assign_role(auth.tenant_id, user_id, req.role_id)
        .await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(json!({ "success": true, "data": { "userId": user_id, "roleId": req.role_id, "created": created } })),
    ))
}

pub async fn revoke_user_role(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    state
        .role_service
        .revoke_role(auth.tenant_id, user_id, role_id)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Role revoked" })))
}
