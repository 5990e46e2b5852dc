//! 路由注册
//! 创建所有 API 路由并应用中间件
//!
//! 层次（由外到内）：HTTP trace / CORS / 请求体限制 -> 请求追踪 -> 审计
//! -> IP 白名单 -> JWT 认证 -> 路由级权限检查 -> handler

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::{
    auth::jwt_auth_middleware,
    authz::PermissionPolicy,
    handlers,
    middleware::{
        audit_middleware, authorize, ip_whitelist_middleware, request_tracking_middleware,
        AppState,
    },
};

fn any_of<const N: usize>(names: [&str; N]) -> PermissionPolicy {
    PermissionPolicy::any_of(names)
}

/// 需要认证的业务路由
fn protected_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let roles_read = || any_of(["roles:read", "roles:manage"]);
    let roles_manage = || any_of(["roles:manage"]);
    let leave_read = || any_of(["leave:read", "leave:manage"]);
    let leave_review = || any_of(["leave:approve", "leave:manage"]);
    let audit_read = || any_of(["audit-logs:read"]);
    let students_manage = || any_of(["students:manage"]);

    Router::new()
        // 当前用户
        .route("/api/v1/auth/me", get(handlers::auth::get_current_user))
        // 角色与权限
        .route(
            "/api/v1/roles",
            authorize(state, roles_read(), get(handlers::role::list_roles))
                .merge(authorize(state, roles_manage(), post(handlers::role::create_role))),
        )
        .route(
            "/api/v1/roles/{id}",
            authorize(state, roles_read(), get(handlers::role::get_role))
                .merge(authorize(state, roles_manage(), put(handlers::role::update_role)))
                .merge(authorize(state, roles_manage(), delete(handlers::role::delete_role))),
        )
        .route(
            "/api/v1/permissions",
            authorize(
                state,
                any_of(["permissions:read", "roles:manage"]),
                get(handlers::role::list_permissions),
            ),
        )
        // 用户与用户角色
        .route(
            "/api/v1/users",
            authorize(
                state,
                any_of(["users:read", "users:manage"]),
                get(handlers::user::list_users),
            )
            .merge(authorize(
                state,
                any_of(["users:manage"]),
                post(handlers::user::create_user),
            )),
        )
        .route(
            "/api/v1/users/{id}/roles",
            authorize(state, roles_read(), get(handlers::role::list_user_roles))
                .merge(authorize(state, roles_manage(), post(handlers::role::assign_user_role))),
        )
        .route(
            "/api/v1/users/{id}/roles/{role_id}",
            authorize(state, roles_manage(), delete(handlers::role::revoke_user_role)),
        )
        // 审计日志
        .route(
            "/api/v1/audit-logs",
            authorize(state, audit_read(), get(handlers::audit::list_audit_logs)),
        )
        .route(
            "/api/v1/audit-logs/stats",
            authorize(state, audit_read(), get(handlers::audit::audit_stats)),
        )
        .route(
            "/api/v1/audit-logs/{id}",
            authorize(state, audit_read(), get(handlers::audit::get_audit_log)),
        )
        // 请假
        .route(
            "/api/v1/leave-requests",
            authorize(state, leave_read(), get(handlers::leave::list_leave_requests)).merge(
                authorize(
                    state,
                    any_of(["leave:create"]),
                    post(handlers::leave::create_leave_request),
                ),
            ),
        )
        .route(
            "/api/v1/leave-requests/{id}",
            authorize(state, leave_read(), get(handlers::leave::get_leave_request)),
        )
        .route(
            "/api/v1/leave-requests/{id}/approve",
            authorize(state, leave_review(), post(handlers::leave::approve_leave_request)),
        )
        .route(
            "/api/v1/leave-requests/{id}/reject",
            authorize(state, leave_review(), post(handlers::leave::reject_leave_request)),
        )
        // 考勤
        .route(
            "/api/v1/attendance",
            authorize(
                state,
                any_of(["attendance:read", "attendance:mark"]),
                get(handlers::attendance::list_attendance),
            )
            .merge(authorize(
                state,
                any_of(["attendance:mark"]),
                post(handlers::attendance::mark_attendance),
            )),
        )
        // 学生
        .route(
            "/api/v1/students",
            authorize(state, students_manage(), post(handlers::student::create_student)),
        )
        .route(
            "/api/v1/students/{id}/parents",
            authorize(
                state,
                any_of(["students:read", "students:manage"]),
                get(handlers::student::list_parents),
            )
            .merge(authorize(state, students_manage(), post(handlers::student::link_parent))),
        )
        // 通知（只涉及调用者本人，无需额外权限）
        .route(
            "/api/v1/notifications",
            get(handlers::notification::list_notifications),
        )
        .route(
            "/api/v1/notifications/unread-count",
            get(handlers::notification::unread_count),
        )
        .route(
            "/api/v1/notifications/read-all",
            put(handlers::notification::mark_all_read),
        )
        .route(
            "/api/v1/notifications/{id}/read",
            put(handlers::notification::mark_read),
        )
        .route(
            "/api/v1/notifications/{id}",
            delete(handlers::notification::delete_notification),
        )
        .route_layer(from_fn_with_state(
            state.jwt_service.clone(),
            jwt_auth_middleware,
        ))
}

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 探针不经过审计
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route_layer(from_fn_with_state(state.clone(), ip_whitelist_middleware));

    let api_routes = Router::new()
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .merge(protected_routes(&state))
        // 白名单拒绝同样要留审计记录
        .route_layer(from_fn_with_state(state.clone(), ip_whitelist_middleware))
        .layer(from_fn_with_state(state.clone(), audit_middleware));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(from_fn(request_tracking_middleware))
        .layer(RequestBodyLimitLayer::new(
            state.config.security.max_request_body_bytes,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
