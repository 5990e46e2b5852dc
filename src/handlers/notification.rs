//! 通知处理器，只操作调用者自己的通知

use axum::{
    extract::{Path, Query, State},
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
    models::notification::NotificationQuery,
};

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .notification_service
        .list(auth.tenant_id, auth.user_id, &query)
        .await?;
    Ok(Json(json!({
        "success": true,
        "data": page.data,
        "unreadCount": page.unread_count,
    })))
}

pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<impl IntoResponse> {
    let count = state
        .notification_service
        .unread_count(auth.tenant_id, auth.user_id)
        .await?;
    Ok(Json(json!({ "success": true, "unreadCount": count })))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let notification = state
        .notification_service
        .mark_read(auth.tenant_id, auth.user_id, id)
        .await?;
    Ok(Json(json!({ "success": true, "data": notification })))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<impl IntoResponse> {
    let updated = state
        .notification_service
        .mark_all_read(auth.tenant_id, auth.user_id)
        .await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state
        .notification_service
        .delete(auth.tenant_id, auth.user_id, id)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Notification deleted" })))
}
