//! 数据库连接池与迁移管理
//! 提供 PostgreSQL 连接池、迁移执行，以及按配置选择存储后端

use crate::config::DatabaseConfig;
use crate::repository::Repositories;
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let db_url = config.url.expose_secret();

    tracing::debug!("Creating database connection pool...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect(db_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create database pool: {}", e);
            DbError::ConnectionFailed(e.to_string())
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool created successfully"
    );

    Ok(pool)
}

/// 运行数据库迁移
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        tracing::error!("Migration failed: {}", e);
        DbError::MigrationFailed(e.to_string())
    })?;

    tracing::info!("Migrations completed successfully");
    Ok(())
}

/// 按 `database.backend` 构建存储层；postgres 后端会先执行迁移
pub async fn connect_repositories(config: &DatabaseConfig) -> Result<Repositories, DbError> {
    if config.is_memory() {
        tracing::warn!("Using in-memory storage backend, data is lost on restart");
        return Ok(Repositories::in_memory());
    }

    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    record_pool_metrics(&pool);

    Ok(Repositories::postgres(pool))
}

/// 记录数据库连接池指标
pub fn record_pool_metrics(pool: &PgPool) {
    metrics::gauge!("db_pool_size").set(pool.size() as f64);
    metrics::gauge!("db_pool_idle").set(pool.num_idle() as f64);
}

/// 数据库错误类型
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}
