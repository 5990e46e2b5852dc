//! Business logic services layer

pub mod attendance_service;
pub mod audit_service;
pub mod auth_service;
pub mod bootstrap;
pub mod directory_service;
pub mod leave_service;
pub mod notification_service;
pub mod permission_service;
pub mod role_service;

pub use attendance_service::AttendanceService;
pub use audit_service::AuditService;
pub use auth_service::AuthService;
pub use bootstrap::{BootstrapManifest, BootstrapReport, Bootstrapper};
pub use directory_service::DirectoryService;
pub use leave_service::LeaveService;
pub use notification_service::{LeaveEvent, NotificationService};
pub use permission_service::PermissionService;
pub use role_service::RoleService;
