//! Data access layer
//!
//! Every repository is a trait so the services run unchanged on PostgreSQL
//! (`Pg*Repository`) or on the in-process [`memory::MemoryStore`].
//! Tenant-scoped operations always take the caller's `tenant_id`.

pub mod attendance_repo;
pub mod audit_repo;
pub mod directory_repo;
pub mod leave_repo;
pub mod memory;
pub mod notification_repo;
pub mod role_repo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    attendance::{AttendanceQuery, AttendanceRecord, MarkAttendanceRequest},
    audit::{AuditLog, AuditLogFilters, AuditStats},
    directory::{
        CreateStudentRequest, CreateTenantRequest, LinkParentRequest, NewUser, Student,
        StudentParent, Tenant, User,
    },
    leave::{CreateLeaveRequest, LeaveRequest, LeaveStatus},
    notification::{Notification, NotificationQuery},
    role::{Permission, Role, RoleMember},
};

pub use attendance_repo::PgAttendanceRepository;
pub use audit_repo::PgAuditRepository;
pub use directory_repo::PgDirectoryRepository;
pub use leave_repo::PgLeaveRepository;
pub use memory::MemoryStore;
pub use notification_repo::PgNotificationRepository;
pub use role_repo::PgRoleRepository;

/// Result of an idempotent "ensure exists" write
#[derive(Debug, Clone)]
pub struct Upserted<T> {
    pub value: T,
    pub created: bool,
}

/// Permission catalog, roles and both join tables
#[async_trait]
pub trait RoleRepository: Send + Sync {
    // ---- permission catalog (global) ----
    async fn ensure_permission(
        &self,
        resource: &str,
        action: &str,
        description: Option<&str>,
    ) -> Result<Upserted<Permission>>;
    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>>;
    async fn find_permissions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Permission>>;
    async fn list_permissions(&self) -> Result<Vec<Permission>>;
    async fn count_permissions(&self) -> Result<i64>;

    // ---- roles (tenant scoped) ----
    async fn ensure_role(
        &self,
        tenant_id: Uuid,
        name: &str,
        description: Option<&str>,
        is_system: bool,
    ) -> Result<Upserted<Role>>;
    async fn find_role(&self, tenant_id: Uuid, role_id: Uuid) -> Result<Option<Role>>;
    async fn find_role_by_name(&self, tenant_id: Uuid, name: &str) -> Result<Option<Role>>;
    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<Role>>;
    /// Creates the role and its permission rows in one unit; duplicate names are `Conflict`
    async fn create_role(
        &self,
        tenant_id: Uuid,
        name: &str,
        description: Option<&str>,
        permission_ids: &[Uuid],
    ) -> Result<Role>;
    /// Renames and replaces the whole permission set atomically
    async fn update_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        name: &str,
        description: Option<&str>,
        permission_ids: &[Uuid],
    ) -> Result<Role>;
    /// Deletes the role unless a user still holds it (`RoleInUse`)
    async fn delete_role(&self, tenant_id: Uuid, role_id: Uuid) -> Result<()>;
    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>>;
    async fn role_members(&self, role_id: Uuid) -> Result<Vec<RoleMember>>;
    /// Idempotent; returns whether a new pair was written
    async fn add_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool>;

    // ---- user roles ----
    /// Idempotent; returns whether a new pair was written
    async fn assign_user_role(&self, tenant_id: Uuid, user_id: Uuid, role_id: Uuid)
        -> Result<bool>;
    async fn revoke_user_role(&self, tenant_id: Uuid, user_id: Uuid, role_id: Uuid)
        -> Result<bool>;
    async fn user_roles(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Role>>;
    /// Union of permission names across every role the user holds in the tenant
    async fn effective_permission_names(&self, tenant_id: Uuid, user_id: Uuid)
        -> Result<Vec<String>>;
}

/// Append-only audit ledger
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert(&self, log: &AuditLog) -> Result<()>;
    async fn query(
        &self,
        tenant_id: Uuid,
        filters: &AuditLogFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>>;
    async fn count(&self, tenant_id: Uuid, filters: &AuditLogFilters) -> Result<i64>;
    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<AuditLog>>;
    async fn stats(
        &self,
        tenant_id: Uuid,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        top: i64,
    ) -> Result<AuditStats>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<()>;
    async fn list_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>>;
    async fn unread_count(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64>;
    async fn mark_read(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid)
        -> Result<Option<Notification>>;
    async fn mark_all_read(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64>;
    async fn delete(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> Result<bool>;
}

/// Tenants, users, students and parent links
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn create_tenant(&self, req: &CreateTenantRequest) -> Result<Tenant>;
    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>>;
    async fn list_tenants(&self) -> Result<Vec<Tenant>>;
    async fn create_user(&self, user: &NewUser) -> Result<User>;
    async fn find_user(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<User>>;
    async fn list_users(&self, tenant_id: Uuid) -> Result<Vec<User>>;
    async fn create_student(&self, tenant_id: Uuid, req: &CreateStudentRequest)
        -> Result<Student>;
    async fn find_student(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Student>>;
    async fn link_parent(&self, student_id: Uuid, req: &LinkParentRequest)
        -> Result<StudentParent>;
    async fn list_parents(&self, student_id: Uuid) -> Result<Vec<StudentParent>>;
    /// Storage liveness check used by the readiness probe
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait LeaveRepository: Send + Sync {
    async fn create(
        &self,
        tenant_id: Uuid,
        requester_id: Uuid,
        req: &CreateLeaveRequest,
    ) -> Result<LeaveRequest>;
    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<LeaveRequest>>;
    async fn list(&self, tenant_id: Uuid, requester_id: Option<Uuid>) -> Result<Vec<LeaveRequest>>;
    /// Moves a PENDING request to `status`; `None` when it was no longer pending
    async fn review(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: LeaveStatus,
        reviewer_id: Uuid,
        comment: Option<&str>,
    ) -> Result<Option<LeaveRequest>>;
}

#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// One record per (student, date); re-marking overwrites status and remarks
    async fn upsert(
        &self,
        tenant_id: Uuid,
        marked_by: Uuid,
        req: &MarkAttendanceRequest,
    ) -> Result<AttendanceRecord>;
    async fn list(&self, tenant_id: Uuid, query: &AttendanceQuery)
        -> Result<Vec<AttendanceRecord>>;
}

/// All repositories behind one cheap-to-clone handle
#[derive(Clone)]
pub struct Repositories {
    pub roles: Arc<dyn RoleRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub directory: Arc<dyn DirectoryRepository>,
    pub leave: Arc<dyn LeaveRepository>,
    pub attendance: Arc<dyn AttendanceRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            roles: Arc::new(PgRoleRepository::new(pool.clone())),
            audit: Arc::new(PgAuditRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            directory: Arc::new(PgDirectoryRepository::new(pool.clone())),
            leave: Arc::new(PgLeaveRepository::new(pool.clone())),
            attendance: Arc::new(PgAttendanceRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            roles: store.clone(),
            audit: store.clone(),
            notifications: store.clone(),
            directory: store.clone(),
            leave: store.clone(),
            attendance: store,
        }
    }
}

/// Translates unique-constraint violations into `Conflict`
pub(crate) fn map_unique_violation(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict(message)
        }
        _ => AppError::Database(err),
    }
}
