//! HTTP 处理器模块

pub mod attendance;
pub mod audit;
pub mod auth;
pub mod health;
pub mod leave;
pub mod notification;
pub mod role;
pub mod student;
pub mod user;
