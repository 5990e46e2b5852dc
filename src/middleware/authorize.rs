//! 路由级权限检查
//!
//! ```ignore
//! .route("/roles", authorize(&state, PermissionPolicy::any_of(["roles:read"]), get(list_roles)))
//! ```

use axum::{
    extract::{Request, State},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::{
    auth::AuthContext,
    authz::{check_tenant, PermissionPolicy},
    error::AppError,
};

/// Header naming the tenant a request targets
pub const TENANT_HEADER: &str = "x-tenant-id";

/// 请求显式指定的租户；缺省时为 `None`
fn requested_tenant(req: &Request) -> Result<Option<Uuid>, AppError> {
    match req.headers().get(TENANT_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid {} header", TENANT_HEADER))),
    }
}

/// 先过租户闸门，再按策略检查有效权限（每次请求重新读取）
pub async fn authorize_middleware(
    State((state, policy)): State<(Arc<AppState>, Arc<PermissionPolicy>)>,
    ctx: AuthContext,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    check_tenant(&ctx, requested_tenant(&req)?)?;
    state.permission_service.authorize(&ctx, &policy).await?;
    Ok(next.run(req).await)
}

/// Guards `route` with `policy`
pub fn authorize(
    state: &Arc<AppState>,
    policy: PermissionPolicy,
    route: MethodRouter<Arc<AppState>>,
) -> MethodRouter<Arc<AppState>> {
    route.route_layer(from_fn_with_state(
        (state.clone(), Arc::new(policy)),
        authorize_middleware,
    ))
}
