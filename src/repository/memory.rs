//! In-process storage backend
//!
//! Implements every repository trait over one `RwLock`, so each trait call is
//! atomic the same way the PostgreSQL transactions are. Selected with
//! `database.backend = "memory"`; the integration tests run against it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AttendanceRepository, AuditRepository, DirectoryRepository, LeaveRepository,
    NotificationRepository, RoleRepository, Upserted,
};
use crate::error::{AppError, Result};
use crate::models::{
    attendance::{AttendanceQuery, AttendanceRecord, MarkAttendanceRequest},
    audit::{AuditCount, AuditLog, AuditLogFilters, AuditStats, AuditStatus},
    directory::{
        CreateStudentRequest, CreateTenantRequest, LinkParentRequest, NewUser, Student,
        StudentParent, Tenant, User,
    },
    leave::{CreateLeaveRequest, LeaveRequest, LeaveStatus},
    notification::{Notification, NotificationQuery},
    role::{permission_name, Permission, Role, RoleMember, UserRole},
};

#[derive(Default)]
struct Inner {
    tenants: Vec<Tenant>,
    users: HashMap<Uuid, User>,
    students: HashMap<Uuid, Student>,
    parents: Vec<StudentParent>,
    permissions: Vec<Permission>,
    roles: HashMap<Uuid, Role>,
    role_permissions: HashSet<(Uuid, Uuid)>,
    user_roles: Vec<UserRole>,
    audit_logs: Vec<AuditLog>,
    notifications: Vec<Notification>,
    leaves: HashMap<Uuid, LeaveRequest>,
    attendance: Vec<AttendanceRecord>,
}

impl Inner {
    fn role_in_tenant(&self, tenant_id: Uuid, role_id: Uuid) -> Option<&Role> {
        self.roles
            .get(&role_id)
            .filter(|role| role.tenant_id == tenant_id)
    }

    fn mutable_role(&self, tenant_id: Uuid, role_id: Uuid) -> Result<&Role> {
        let role = self
            .role_in_tenant(tenant_id, role_id)
            .ok_or_else(|| AppError::not_found("Role"))?;
        if role.is_system {
            return Err(AppError::SystemRoleProtected(role.name.clone()));
        }
        Ok(role)
    }

    fn role_name_taken(&self, tenant_id: Uuid, name: &str, except: Option<Uuid>) -> bool {
        self.roles.values().any(|role| {
            role.tenant_id == tenant_id && role.name == name && Some(role.id) != except
        })
    }

    fn replace_role_permissions(&mut self, role_id: Uuid, permission_ids: &[Uuid]) {
        self.role_permissions.retain(|(role, _)| *role != role_id);
        for permission_id in permission_ids {
            self.role_permissions.insert((role_id, *permission_id));
        }
    }

    fn audit_logs_for(&self, tenant_id: Uuid) -> impl Iterator<Item = &AuditLog> {
        self.audit_logs
            .iter()
            .filter(move |log| log.tenant_id == Some(tenant_id))
    }
}

/// Memory-backed implementation of all repositories
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    fail_audit_writes: AtomicBool,
    fail_notification_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an unavailable audit table; inserts return `Internal`
    pub fn set_fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    /// Simulates an unavailable notification table
    pub fn set_fail_notification_writes(&self, fail: bool) {
        self.fail_notification_writes.store(fail, Ordering::SeqCst);
    }

    /// Every audit row regardless of tenant, oldest first
    pub async fn all_audit_logs(&self) -> Vec<AuditLog> {
        self.inner.read().await.audit_logs.clone()
    }

    /// Every notification regardless of tenant or recipient, oldest first
    pub async fn all_notifications(&self) -> Vec<Notification> {
        self.inner.read().await.notifications.clone()
    }
}

fn top_counts<'a>(keys: impl Iterator<Item = &'a str>, top: i64) -> Vec<AuditCount> {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }

    let mut buckets: Vec<AuditCount> = counts
        .into_iter()
        .map(|(key, count)| AuditCount {
            key: key.to_string(),
            count,
        })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    buckets.truncate(top.max(0) as usize);
    buckets
}

fn page<T: Clone>(items: Vec<&T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn ensure_permission(
        &self,
        resource: &str,
        action: &str,
        description: Option<&str>,
    ) -> Result<Upserted<Permission>> {
        let name = permission_name(resource, action);
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.permissions.iter().find(|p| p.name == name) {
            return Ok(Upserted {
                value: existing.clone(),
                created: false,
            });
        }

        let permission = Permission {
            id: Uuid::new_v4(),
            resource: resource.to_string(),
            action: action.to_string(),
            name,
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };
        inner.permissions.push(permission.clone());

        Ok(Upserted {
            value: permission,
            created: true,
        })
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        let inner = self.inner.read().await;
        Ok(inner.permissions.iter().find(|p| p.name == name).cloned())
    }

    async fn find_permissions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Permission>> {
        let inner = self.inner.read().await;
        let mut found: Vec<Permission> = inner
            .permissions
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let inner = self.inner.read().await;
        let mut permissions = inner.permissions.clone();
        permissions.sort_by(|a, b| (&a.resource, &a.action).cmp(&(&b.resource, &b.action)));
        Ok(permissions)
    }

    async fn count_permissions(&self) -> Result<i64> {
        Ok(self.inner.read().await.permissions.len() as i64)
    }

    async fn ensure_role(
        &self,
        tenant_id: Uuid,
        name: &str,
        description: Option<&str>,
        is_system: bool,
    ) -> Result<Upserted<Role>> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner
            .roles
            .values()
            .find(|r| r.tenant_id == tenant_id && r.name == name)
        {
            return Ok(Upserted {
                value: existing.clone(),
                created: false,
            });
        }

        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            is_system,
            created_at: now,
            updated_at: now,
        };
        inner.roles.insert(role.id, role.clone());

        Ok(Upserted {
            value: role,
            created: true,
        })
    }

    async fn find_role(&self, tenant_id: Uuid, role_id: Uuid) -> Result<Option<Role>> {
        let inner = self.inner.read().await;
        Ok(inner.role_in_tenant(tenant_id, role_id).cloned())
    }

    async fn find_role_by_name(&self, tenant_id: Uuid, name: &str) -> Result<Option<Role>> {
        let inner = self.inner.read().await;
        Ok(inner
            .roles
            .values()
            .find(|r| r.tenant_id == tenant_id && r.name == name)
            .cloned())
    }

    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<Role>> {
        let inner = self.inner.read().await;
        let mut roles: Vec<Role> = inner
            .roles
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create_role(
        &self,
        tenant_id: Uuid,
        name: &str,
        description: Option<&str>,
        permission_ids: &[Uuid],
    ) -> Result<Role> {
        let mut inner = self.inner.write().await;

        if inner.role_name_taken(tenant_id, name, None) {
            return Err(AppError::conflict("Role with this name already exists"));
        }

        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            is_system: false,
            created_at: now,
            updated_at: now,
        };
        inner.roles.insert(role.id, role.clone());
        inner.replace_role_permissions(role.id, permission_ids);

        Ok(role)
    }

    async fn update_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        name: &str,
        description: Option<&str>,
        permission_ids: &[Uuid],
    ) -> Result<Role> {
        let mut inner = self.inner.write().await;

        inner.mutable_role(tenant_id, role_id)?;
        if inner.role_name_taken(tenant_id, name, Some(role_id)) {
            return Err(AppError::conflict("Role with this name already exists"));
        }

        let role = inner
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::not_found("Role"))?;
        role.name = name.to_string();
        role.description = description.map(str::to_string);
        role.updated_at = Utc::now();
        let updated = role.clone();

        inner.replace_role_permissions(role_id, permission_ids);

        Ok(updated)
    }

    async fn delete_role(&self, tenant_id: Uuid, role_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;

        inner.mutable_role(tenant_id, role_id)?;
        let user_count = inner
            .user_roles
            .iter()
            .filter(|ur| ur.role_id == role_id)
            .count() as i64;
        if user_count > 0 {
            return Err(AppError::RoleInUse { user_count });
        }

        inner.roles.remove(&role_id);
        inner.role_permissions.retain(|(role, _)| *role != role_id);

        Ok(())
    }

    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>> {
        let inner = self.inner.read().await;
        let mut permissions: Vec<Permission> = inner
            .permissions
            .iter()
            .filter(|p| inner.role_permissions.contains(&(role_id, p.id)))
            .cloned()
            .collect();
        permissions.sort_by(|a, b| (&a.resource, &a.action).cmp(&(&b.resource, &b.action)));
        Ok(permissions)
    }

    async fn role_members(&self, role_id: Uuid) -> Result<Vec<RoleMember>> {
        let inner = self.inner.read().await;
        let mut members: Vec<RoleMember> = inner
            .user_roles
            .iter()
            .filter(|ur| ur.role_id == role_id)
            .filter_map(|ur| inner.users.get(&ur.user_id))
            .map(|user| RoleMember {
                user_id: user.id,
                email: user.email.clone(),
                name: user.name.clone(),
            })
            .collect();
        members.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(members)
    }

    async fn add_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.role_permissions.insert((role_id, permission_id)))
    }

    async fn assign_user_role(&self, tenant_id: Uuid, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;

        if inner
            .user_roles
            .iter()
            .any(|ur| ur.user_id == user_id && ur.role_id == role_id)
        {
            return Ok(false);
        }

        inner.user_roles.push(UserRole {
            user_id,
            role_id,
            tenant_id,
            assigned_at: Utc::now(),
        });
        Ok(true)
    }

    async fn revoke_user_role(&self, tenant_id: Uuid, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.user_roles.len();
        inner.user_roles.retain(|ur| {
            !(ur.user_id == user_id && ur.role_id == role_id && ur.tenant_id == tenant_id)
        });
        Ok(inner.user_roles.len() < before)
    }

    async fn user_roles(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Role>> {
        let inner = self.inner.read().await;
        let mut roles: Vec<Role> = inner
            .user_roles
            .iter()
            .filter(|ur| ur.user_id == user_id && ur.tenant_id == tenant_id)
            .filter_map(|ur| inner.role_in_tenant(tenant_id, ur.role_id))
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn effective_permission_names(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<String>> {
        let inner = self.inner.read().await;

        let role_ids: HashSet<Uuid> = inner
            .user_roles
            .iter()
            .filter(|ur| ur.user_id == user_id && ur.tenant_id == tenant_id)
            .filter(|ur| inner.role_in_tenant(tenant_id, ur.role_id).is_some())
            .map(|ur| ur.role_id)
            .collect();

        let names: BTreeSet<String> = inner
            .role_permissions
            .iter()
            .filter(|(role_id, _)| role_ids.contains(role_id))
            .filter_map(|(_, permission_id)| {
                inner.permissions.iter().find(|p| p.id == *permission_id)
            })
            .map(|p| p.name.clone())
            .collect();

        Ok(names.into_iter().collect())
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn insert(&self, log: &AuditLog) -> Result<()> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(AppError::internal_error("audit storage unavailable"));
        }
        self.inner.write().await.audit_logs.push(log.clone());
        Ok(())
    }

    async fn query(
        &self,
        tenant_id: Uuid,
        filters: &AuditLogFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>> {
        let inner = self.inner.read().await;
        let mut logs: Vec<&AuditLog> = inner
            .audit_logs_for(tenant_id)
            .filter(|log| filters.matches(log))
            .collect();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(page(logs, limit, offset))
    }

    async fn count(&self, tenant_id: Uuid, filters: &AuditLogFilters) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .audit_logs_for(tenant_id)
            .filter(|log| filters.matches(log))
            .count() as i64)
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<AuditLog>> {
        let inner = self.inner.read().await;
        let found = inner.audit_logs_for(tenant_id).find(|log| log.id == id).cloned();
        Ok(found)
    }

    async fn stats(
        &self,
        tenant_id: Uuid,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        top: i64,
    ) -> Result<AuditStats> {
        let filters = AuditLogFilters {
            start_time,
            end_time,
            ..Default::default()
        };
        let inner = self.inner.read().await;
        let logs: Vec<&AuditLog> = inner
            .audit_logs_for(tenant_id)
            .filter(|log| filters.matches(log))
            .collect();

        let count_status = |status: AuditStatus| logs.iter().filter(|l| l.status == status).count() as i64;

        Ok(AuditStats {
            total: logs.len() as i64,
            success: count_status(AuditStatus::Success),
            failure: count_status(AuditStatus::Failure),
            top_actions: top_counts(logs.iter().map(|l| l.action.as_str()), top),
            top_resources: top_counts(logs.iter().map(|l| l.resource.as_str()), top),
        })
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert(&self, notification: &Notification) -> Result<()> {
        if self.fail_notification_writes.load(Ordering::SeqCst) {
            return Err(AppError::internal_error("notification storage unavailable"));
        }
        self.inner
            .write()
            .await
            .notifications
            .push(notification.clone());
        Ok(())
    }

    async fn list_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>> {
        let inner = self.inner.read().await;
        let mut items: Vec<&Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.tenant_id == tenant_id && n.user_id == user_id)
            .filter(|n| !query.unread_only || !n.is_read)
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(items, query.limit, query.offset))
    }

    async fn unread_count(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .notifications
            .iter()
            .filter(|n| n.tenant_id == tenant_id && n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> Result<Option<Notification>> {
        let mut inner = self.inner.write().await;
        let Some(notification) = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.tenant_id == tenant_id && n.user_id == user_id)
        else {
            return Ok(None);
        };

        if !notification.is_read {
            notification.is_read = true;
            notification.read_at = Some(Utc::now());
        }
        Ok(Some(notification.clone()))
    }

    async fn mark_all_read(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut updated = 0;
        for n in inner
            .notifications
            .iter_mut()
            .filter(|n| n.tenant_id == tenant_id && n.user_id == user_id && !n.is_read)
        {
            n.is_read = true;
            n.read_at = Some(now);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.notifications.len();
        inner
            .notifications
            .retain(|n| !(n.id == id && n.tenant_id == tenant_id && n.user_id == user_id));
        Ok(inner.notifications.len() < before)
    }
}

#[async_trait]
impl DirectoryRepository for MemoryStore {
    async fn create_tenant(&self, req: &CreateTenantRequest) -> Result<Tenant> {
        let mut inner = self.inner.write().await;
        let domain = req.domain.to_lowercase();
        let email = req.email.to_lowercase();

        if inner
            .tenants
            .iter()
            .any(|t| t.domain == domain || t.email == email)
        {
            return Err(AppError::conflict(
                "Tenant with this domain or email already exists",
            ));
        }

        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: req.name.clone(),
            domain,
            email,
            created_at: Utc::now(),
        };
        inner.tenants.push(tenant.clone());
        Ok(tenant)
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        let inner = self.inner.read().await;
        Ok(inner.tenants.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        Ok(self.inner.read().await.tenants.clone())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut inner = self.inner.write().await;
        let email = user.email.to_lowercase();

        if inner
            .users
            .values()
            .any(|u| u.tenant_id == user.tenant_id && u.email == email)
        {
            return Err(AppError::conflict("User with this email already exists"));
        }

        let created = User {
            id: Uuid::new_v4(),
            tenant_id: user.tenant_id,
            email,
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            is_active: true,
            created_at: Utc::now(),
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(&id)
            .filter(|u| u.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_user_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.tenant_id == tenant_id && u.email == email)
            .cloned())
    }

    async fn list_users(&self, tenant_id: Uuid) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn create_student(&self, tenant_id: Uuid, req: &CreateStudentRequest) -> Result<Student> {
        let student = Student {
            id: Uuid::new_v4(),
            tenant_id,
            name: req.name.clone(),
            class_name: req.class_name.clone(),
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .students
            .insert(student.id, student.clone());
        Ok(student)
    }

    async fn find_student(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Student>> {
        let inner = self.inner.read().await;
        Ok(inner
            .students
            .get(&id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    async fn link_parent(&self, student_id: Uuid, req: &LinkParentRequest) -> Result<StudentParent> {
        let mut inner = self.inner.write().await;

        if req.user_id.is_some()
            && inner
                .parents
                .iter()
                .any(|p| p.student_id == student_id && p.user_id == req.user_id)
        {
            return Err(AppError::conflict(
                "This user is already linked to the student",
            ));
        }

        let parent = StudentParent {
            id: Uuid::new_v4(),
            student_id,
            name: req.name.clone(),
            relationship: req.relationship.clone(),
            user_id: req.user_id,
        };
        inner.parents.push(parent.clone());
        Ok(parent)
    }

    async fn list_parents(&self, student_id: Uuid) -> Result<Vec<StudentParent>> {
        let inner = self.inner.read().await;
        let mut parents: Vec<StudentParent> = inner
            .parents
            .iter()
            .filter(|p| p.student_id == student_id)
            .cloned()
            .collect();
        parents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(parents)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl LeaveRepository for MemoryStore {
    async fn create(
        &self,
        tenant_id: Uuid,
        requester_id: Uuid,
        req: &CreateLeaveRequest,
    ) -> Result<LeaveRequest> {
        let leave = LeaveRequest {
            id: Uuid::new_v4(),
            tenant_id,
            requester_id,
            student_id: req.student_id,
            leave_type: req.leave_type.clone(),
            start_date: req.start_date,
            end_date: req.end_date,
            reason: req.reason.clone(),
            is_emergency: req.is_emergency,
            status: LeaveStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_comment: None,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .leaves
            .insert(leave.id, leave.clone());
        Ok(leave)
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<LeaveRequest>> {
        let inner = self.inner.read().await;
        Ok(inner
            .leaves
            .get(&id)
            .filter(|l| l.tenant_id == tenant_id)
            .cloned())
    }

    async fn list(&self, tenant_id: Uuid, requester_id: Option<Uuid>) -> Result<Vec<LeaveRequest>> {
        let inner = self.inner.read().await;
        let mut leaves: Vec<LeaveRequest> = inner
            .leaves
            .values()
            .filter(|l| l.tenant_id == tenant_id)
            .filter(|l| requester_id.map_or(true, |id| l.requester_id == id))
            .cloned()
            .collect();
        leaves.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leaves)
    }

    async fn review(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: LeaveStatus,
        reviewer_id: Uuid,
        comment: Option<&str>,
    ) -> Result<Option<LeaveRequest>> {
        let mut inner = self.inner.write().await;
        let Some(leave) = inner
            .leaves
            .get_mut(&id)
            .filter(|l| l.tenant_id == tenant_id && l.status == LeaveStatus::Pending)
        else {
            return Ok(None);
        };

        leave.status = status;
        leave.reviewed_by = Some(reviewer_id);
        leave.reviewed_at = Some(Utc::now());
        leave.review_comment = comment.map(str::to_string);
        Ok(Some(leave.clone()))
    }
}

#[async_trait]
impl AttendanceRepository for MemoryStore {
    async fn upsert(
        &self,
        tenant_id: Uuid,
        marked_by: Uuid,
        req: &MarkAttendanceRequest,
    ) -> Result<AttendanceRecord> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        if let Some(record) = inner
            .attendance
            .iter_mut()
            .find(|r| r.student_id == req.student_id && r.date == req.date)
        {
            record.status = req.status;
            record.remarks = req.remarks.clone();
            record.marked_by = marked_by;
            record.updated_at = now;
            return Ok(record.clone());
        }

        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            tenant_id,
            student_id: req.student_id,
            date: req.date,
            status: req.status,
            remarks: req.remarks.clone(),
            marked_by,
            updated_at: now,
        };
        inner.attendance.push(record.clone());
        Ok(record)
    }

    async fn list(&self, tenant_id: Uuid, query: &AttendanceQuery) -> Result<Vec<AttendanceRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<AttendanceRecord> = inner
            .attendance
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| query.student_id.map_or(true, |id| r.student_id == id))
            .filter(|r| query.date.map_or(true, |d| r.date == d))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.student_id.cmp(&b.student_id)));
        Ok(records)
    }
}
