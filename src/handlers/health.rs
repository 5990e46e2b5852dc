//! 健康检查处理器
//! 提供 /health 和 /ready 端点

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::middleware::AppState;

static APP_START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// 就绪探针响应
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheck>,
}

/// 健康检查项
#[derive(Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 记录启动时间，main 中尽早调用
pub fn set_start_time() {
    Lazy::force(&APP_START_TIME);
}

pub fn get_uptime() -> u64 {
    APP_START_TIME.elapsed().as_secs()
}

/// 存活探针
/// 快速响应，不检查依赖
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: get_uptime(),
    })
}

/// 就绪探针
/// 检查存储是否可用，不可用时返回 503
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage = match state.repos.directory.ping().await {
        Ok(()) => HealthCheck {
            name: "storage",
            status: "healthy",
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            HealthCheck {
                name: "storage",
                status: "unhealthy",
                message: Some(e.to_string()),
            }
        }
    };

    let checks = vec![storage];
    let ready = checks.iter().all(|c| c.status == "healthy");
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(ReadinessResponse { ready, checks }))
}
