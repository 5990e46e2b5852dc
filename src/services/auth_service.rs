//! 认证服务：登录与当前用户信息

use std::sync::Arc;
use validator::Validate;

use super::permission_service::PermissionService;
use crate::{
    auth::{AuthContext, JwtService, PasswordHasher, TokenSubject},
    error::{AppError, Result},
    models::auth::*,
    repository::{DirectoryRepository, RoleRepository},
};

pub struct AuthService {
    directory: Arc<dyn DirectoryRepository>,
    roles: Arc<dyn RoleRepository>,
    permissions: Arc<PermissionService>,
    jwt_service: Arc<JwtService>,
    hasher: Arc<PasswordHasher>,
}

impl AuthService {
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        roles: Arc<dyn RoleRepository>,
        permissions: Arc<PermissionService>,
        jwt_service: Arc<JwtService>,
        hasher: Arc<PasswordHasher>,
    ) -> Self {
        Self {
            directory,
            roles,
            permissions,
            jwt_service,
            hasher,
        }
    }

    /// 用户登录
    ///
    /// 未知账号、停用账号与密码错误返回同一个 401。
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse> {
        req.validate()?;

        let user = self
            .directory
            .find_user_by_email(req.tenant_id, &req.email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Login attempt on inactive account");
            return Err(AppError::Unauthorized);
        }

        if let Err(e) = self.hasher.verify(&req.password, &user.password_hash) {
            tracing::warn!(tenant_id = %user.tenant_id, user_id = %user.id, "Login failed");
            return Err(e);
        }

        let roles: Vec<String> = self
            .roles
            .user_roles(user.tenant_id, user.id)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect();

        let access_token = self.jwt_service.generate_access_token(TokenSubject {
            user_id: user.id,
            tenant_id: user.tenant_id,
            email: &user.email,
            name: &user.name,
            roles: roles.clone(),
        })?;

        tracing::info!(tenant_id = %user.tenant_id, user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer",
            expires_in: self.jwt_service.access_token_exp_secs(),
            user: user.into(),
            roles,
        })
    }

    /// 当前用户及其有效权限
    pub async fn me(&self, ctx: AuthContext) -> Result<MeResponse> {
        let permissions = self
            .permissions
            .effective_permissions(ctx.tenant_id, ctx.user_id)
            .await?
            .into_vec();
        Ok(MeResponse {
            user: ctx,
            permissions,
        })
    }
}
