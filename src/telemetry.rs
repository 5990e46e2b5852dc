//! 日志与追踪系统
//! 初始化结构化日志，并登记服务暴露的指标

use crate::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 初始化日志与追踪系统（`RUST_LOG` 优先于配置）
pub fn init_telemetry(config: &AppConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_layer = match config.logging.format.to_lowercase().as_str() {
        // JSON 格式（生产环境）
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .boxed(),
        // 美化格式（开发环境）
        _ => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
    };

    // 重复初始化（例如 CLI 子命令内再次调用）时保留已有 subscriber
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
        return;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.app.environment,
        level = %config.logging.level,
        format = %config.logging.format,
        "Telemetry initialized"
    );
}

/// 登记指标说明；metrics 0.24 在首次使用时创建指标
pub fn init_metrics() {
    metrics::describe_counter!("http_requests_total", "HTTP requests by method and status");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
    metrics::describe_counter!("authz_denied_total", "Requests rejected by the authorization layer");
    metrics::describe_counter!("audit_write_failures_total", "Audit rows that could not be persisted");
    metrics::describe_counter!(
        "notification_failures_total",
        "Notifications that could not be created"
    );

    tracing::debug!("Metrics initialized");
}
