//! JWT 认证中间件

use crate::{auth::jwt::JwtService, error::AppError};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// 认证上下文（附加到请求扩展，并复制到响应扩展供审计中间件读取）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 从 Authorization 头提取令牌
pub fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized)
}

/// 校验令牌并还原认证上下文
pub fn authenticate(jwt_service: &JwtService, headers: &HeaderMap) -> Result<AuthContext, AppError> {
    let token = extract_token(headers)?;
    let claims = jwt_service.validate_token(&token)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
    let tenant_id = Uuid::parse_str(&claims.tenant_id).map_err(|_| AppError::Unauthorized)?;

    Ok(AuthContext {
        user_id,
        tenant_id,
        email: claims.email,
        name: claims.name,
        roles: claims.roles,
    })
}

/// JWT 认证中间件 - 必须认证
pub async fn jwt_auth_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_context = match authenticate(&jwt_service, req.headers()) {
        Ok(ctx) => ctx,
        Err(err) => {
            tracing::debug!(path = %req.uri().path(), "Rejected unauthenticated request");
            return Err(err);
        }
    };

    // 附加到请求扩展
    req.extensions_mut().insert(auth_context.clone());

    let mut response = next.run(req).await;
    response.extensions_mut().insert(auth_context);

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenSubject;
    use crate::config::test_config;

    #[test]
    fn test_extract_token_valid() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer test_token_123".parse().unwrap());

        let token = extract_token(&headers).unwrap();
        assert_eq!(token, "test_token_123");
    }

    #[test]
    fn test_extract_token_missing() {
        let headers = HeaderMap::new();
        assert!(extract_token(&headers).is_err());
    }

    #[test]
    fn test_extract_token_invalid_format() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "InvalidFormat".parse().unwrap());
        assert!(extract_token(&headers).is_err());

        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert!(extract_token(&headers).is_err());
    }

    #[test]
    fn test_authenticate_restores_context() {
        let jwt = JwtService::from_config(&test_config()).unwrap();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let token = jwt
            .generate_access_token(TokenSubject {
                user_id,
                tenant_id,
                email: "a@b.test",
                name: "A",
                roles: vec!["Staff".to_string()],
            })
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {}", token).parse().unwrap());

        let ctx = authenticate(&jwt, &headers).unwrap();
        assert_eq!(ctx.user_id, user_id);
        assert_eq!(ctx.tenant_id, tenant_id);
        assert_eq!(ctx.roles, vec!["Staff".to_string()]);
    }
}
