//! 审计日志查询处理器（这些路径本身不记审计）

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
    models::audit::{AuditLogQuery, AuditStatsQuery},
};

/// 查询审计日志
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse> {
    let page = state.audit_service.query(auth.tenant_id, &query).await?;
    Ok(Json(json!({
        "success": true,
        "data": page.data,
        "total": page.total,
        "limit": page.limit,
        "offset": page.offset,
    })))
}

/// 审计统计
pub async fn audit_stats(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Query(query): Query<AuditStatsQuery>,
) -> Result<impl IntoResponse> {
    let stats = state
        .audit_service
        .stats(auth.tenant_id, query.start_time, query.end_time)
        .await?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

pub async fn get_audit_log(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let log = state.audit_service.find(auth.tenant_id, id).await?;
    Ok(Json(json!({ "success": true, "data": log })))
}
