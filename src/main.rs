//! 学校系统主入口
//! serve（默认）/ seed / provision-tenant

use clap::{Parser, Subcommand};
use school_system::{
    config::AppConfig, error, handlers::health, models::directory::*,
    routes, telemetry,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "school-system", version, about = "Multi-tenant school system API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// 启动 HTTP 服务
    Serve,
    /// 同步权限目录与默认角色
    Seed {
        /// 只同步该租户的角色
        #[arg(long)]
        tenant: Option<Uuid>,
    },
    /// 创建租户及其管理员账号
    ProvisionTenant {
        #[arg(long)]
        name: String,
        #[arg(long)]
        domain: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        admin_email: String,
        #[arg(long)]
        admin_name: String,
        #[arg(long)]
        admin_password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.local > .env.development > .env
    if let Ok(env) = std::env::var("SCHOOL_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    telemetry::init_telemetry(&config);
    telemetry::init_metrics();
    error::set_expose_error_details(config.app.is_development());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Seed { tenant } => seed(config, tenant).await,
        Command::ProvisionTenant {
            name,
            domain,
            email,
            admin_email,
            admin_name,
            admin_password,
        } => {
            provision(
                config,
                ProvisionTenantRequest {
                    tenant: CreateTenantRequest {
                        name,
                        domain,
                        email,
                    },
                    admin_email,
                    admin_name,
                    admin_password,
                },
            )
            .await
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "School system starting...");

    let state = school_system::build_state(config.clone()).await?;

    if config.bootstrap.run_on_startup {
        let report = state.bootstrapper.run_all().await?;
        if !report.is_clean() {
            tracing::warn!(failed = report.failed, skipped = ?report.skipped, "Bootstrap finished with problems");
        }
    }

    let app = routes::create_router(state);

    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn seed(config: AppConfig, tenant: Option<Uuid>) -> anyhow::Result<()> {
    let state = school_system::build_state(config).await?;

    let report = match tenant {
        Some(tenant_id) => {
            if state.repos.directory.find_tenant(tenant_id).await?.is_none() {
                anyhow::bail!("Tenant {} not found", tenant_id);
            }
            let mut report = state.bootstrapper.run_global().await;
            report.merge(state.bootstrapper.run_for_tenant(tenant_id).await);
            report
        }
        None => state.bootstrapper.run_all().await?,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.failed > 0 {
        anyhow::bail!("{} bootstrap step(s) failed", report.failed);
    }
    Ok(())
}

async fn provision(config: AppConfig, req: ProvisionTenantRequest) -> anyhow::Result<()> {
    if config.database.is_memory() {
        tracing::warn!("Provisioning into the in-memory backend; nothing will persist");
    }
    let state = school_system::build_state(config).await?;

    state.bootstrapper.run_global().await;
    let provisioned = state.directory_service.provision_tenant(req).await?;

    println!("{}", serde_json::to_string_pretty(&provisioned)?);
    Ok(())
}

/// 优雅关闭信号处理；收到信号后超过时限仍未结束则强制退出
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}
