//! 授权策略
//!
//! 路由声明一个 [`PermissionPolicy`]，授权层把它和调用者在当前租户下的
//! 有效权限集合（各角色权限的并集）进行比对。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::AppError;

/// Effective permission names of one user in one tenant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Permission requirement attached to a route
///
/// `AnyOf([])` is never satisfied; `AllOf([])` always is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionPolicy {
    AnyOf(Vec<String>),
    AllOf(Vec<String>),
    Not(Box<PermissionPolicy>),
}

impl PermissionPolicy {
    /// Satisfied when the caller holds at least one of `names`
    pub fn any_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PermissionPolicy::AnyOf(names.into_iter().map(Into::into).collect())
    }

    /// Satisfied when the caller holds every one of `names`
    pub fn all_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PermissionPolicy::AllOf(names.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, granted: &PermissionSet) -> bool {
        match self {
            PermissionPolicy::AnyOf(names) => names.iter().any(|n| granted.contains(n)),
            PermissionPolicy::AllOf(names) => names.iter().all(|n| granted.contains(n)),
            PermissionPolicy::Not(inner) => !inner.allows(granted),
        }
    }
}

impl std::ops::Not for PermissionPolicy {
    type Output = PermissionPolicy;

    fn not(self) -> Self::Output {
        PermissionPolicy::Not(Box::new(self))
    }
}

impl fmt::Display for PermissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionPolicy::AnyOf(names) => write!(f, "any_of({})", names.join(", ")),
            PermissionPolicy::AllOf(names) => write!(f, "all_of({})", names.join(", ")),
            PermissionPolicy::Not(inner) => write!(f, "not({})", inner),
        }
    }
}

/// 租户闸门：请求显式指定的租户必须与调用者一致，与权限无关
pub fn check_tenant(ctx: &AuthContext, requested: Option<Uuid>) -> Result<(), AppError> {
    match requested {
        Some(tenant_id) if tenant_id != ctx.tenant_id => {
            tracing::warn!(
                user_id = %ctx.user_id,
                tenant_id = %ctx.tenant_id,
                requested_tenant = %tenant_id,
                "Cross-tenant access rejected"
            );
            Err(AppError::TenantMismatch)
        }
        _ => Ok(()),
    }
}
