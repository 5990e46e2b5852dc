//! HTTP 中间件
//! 请求追踪、IP 白名单、审计、权限检查

pub mod audit;
pub mod authorize;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::{JwtService, PasswordHasher},
    config::AppConfig,
    error::AppError,
    repository::Repositories,
    services::*,
};

pub use audit::audit_middleware;
pub use authorize::{authorize, authorize_middleware};

/// 应用状态
///
/// 服务都用 Arc 包装，克隆 AppState 只是指针拷贝。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub repos: Repositories,
    pub jwt_service: Arc<JwtService>,
    pub permission_service: Arc<PermissionService>,
    pub role_service: Arc<RoleService>,
    pub audit_service: Arc<AuditService>,
    pub notification_service: Arc<NotificationService>,
    pub leave_service: Arc<LeaveService>,
    pub attendance_service: Arc<AttendanceService>,
    pub directory_service: Arc<DirectoryService>,
    pub auth_service: Arc<AuthService>,
    pub bootstrapper: Arc<Bootstrapper>,
}

impl AppState {
    /// 按依赖顺序组装所有服务
    pub fn new(
        config: AppConfig,
        repos: Repositories,
        manifest: BootstrapManifest,
    ) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::from_config(&config)?);
        let hasher = Arc::new(PasswordHasher::from_config(&config.security)?);

        let permission_service = Arc::new(PermissionService::new(repos.roles.clone()));
        let bootstrapper = Arc::new(Bootstrapper::new(
            permission_service.clone(),
            repos.directory.clone(),
            manifest,
        ));
        let notification_service = Arc::new(NotificationService::new(
            repos.notifications.clone(),
            repos.directory.clone(),
        ));

        Ok(Self {
            role_service: Arc::new(RoleService::new(
                repos.roles.clone(),
                repos.directory.clone(),
            )),
            audit_service: Arc::new(AuditService::new(repos.audit.clone())),
            leave_service: Arc::new(LeaveService::new(
                repos.leave.clone(),
                repos.directory.clone(),
                permission_service.clone(),
                notification_service.clone(),
            )),
            attendance_service: Arc::new(AttendanceService::new(
                repos.attendance.clone(),
                repos.directory.clone(),
                notification_service.clone(),
            )),
            directory_service: Arc::new(DirectoryService::new(
                repos.directory.clone(),
                repos.roles.clone(),
                hasher.clone(),
                config.security.clone(),
                bootstrapper.clone(),
            )),
            auth_service: Arc::new(AuthService::new(
                repos.directory.clone(),
                repos.roles.clone(),
                permission_service.clone(),
                jwt_service.clone(),
                hasher,
            )),
            notification_service,
            permission_service,
            bootstrapper,
            jwt_service,
            repos,
            config,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        let status = response.status().as_u16();
        metrics::counter!(
            "http_requests_total",
            "method" => method.as_str().to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(status, elapsed_ms = elapsed.as_millis() as u64, "Request completed");

        for (name, value) in [("x-trace-id", &trace_id), ("x-request-id", &request_id)] {
            if let Ok(value) = HeaderValue::from_str(value) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// IP 白名单中间件
pub async fn ip_whitelist_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(allowed_ips) = &state.config.security.allowed_ips {
        let client_ip = client_ip(&req, state.config.security.trust_proxy);
        let allowed = client_ip
            .as_deref()
            .map_or(false, |ip| allowed_ips.iter().any(|a| a == ip));

        if !allowed {
            tracing::warn!(client_ip = ?client_ip, "IP not in whitelist");
            return Err(AppError::denied("IP address not allowed"));
        }
    }

    Ok(next.run(req).await)
}

/// 客户端 IP：信任代理时取 X-Forwarded-For / X-Real-IP，否则取连接地址
pub fn client_ip(req: &Request, trust_proxy: bool) -> Option<String> {
    let headers = req.headers();

    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if let Some(ip) = forwarded.or(real_ip) {
            return Some(ip.to_string());
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_extract_or_generate_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "test-trace-123".parse().unwrap());
        assert_eq!(extract_or_generate_trace_id(&headers), "test-trace-123");

        let generated = extract_or_generate_trace_id(&HeaderMap::new());
        assert!(Uuid::parse_str(&generated).is_ok());
    }

    #[test]
    fn test_client_ip_prefers_proxy_headers_only_when_trusted() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 4000))));

        assert_eq!(client_ip(&req, true).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&req, false).as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn test_client_ip_unknown_without_connect_info() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req, false), None);
    }
}
