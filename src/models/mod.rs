//! 数据模型模块
//! 目录（租户、用户、学生）、角色权限、审计、通知，以及触发通知的请假/考勤业务模型

pub mod attendance;
pub mod audit;
pub mod auth;
pub mod directory;
pub mod leave;
pub mod notification;
pub mod role;
