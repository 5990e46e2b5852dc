//! 多租户学校系统：权限目录、角色管理、授权、审计与通知
//! 供 HTTP 服务、CLI 与集成测试共用

pub mod auth;
pub mod authz;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;

use std::sync::Arc;

use crate::{
    config::AppConfig, middleware::AppState, repository::Repositories,
    services::BootstrapManifest,
};

/// 连接存储、加载初始化清单并组装应用状态
pub async fn build_state(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let repos = db::connect_repositories(&config.database).await?;
    build_state_with(config, repos)
}

/// 使用给定存储组装应用状态（测试用内存存储）
pub fn build_state_with(config: AppConfig, repos: Repositories) -> anyhow::Result<Arc<AppState>> {
    let manifest = BootstrapManifest::load(config.bootstrap.manifest_path.as_deref())?;
    Ok(Arc::new(AppState::new(config, repos, manifest)?))
}
