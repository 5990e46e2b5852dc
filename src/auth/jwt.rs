//! JWT token generation and validation

use crate::{config::AppConfig, error::AppError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Tenant the user belongs to
    pub tenant_id: String,

    pub email: String,

    pub name: String,

    /// Role names at issue time (display only; permissions are re-read per request)
    pub roles: Vec<String>,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

/// Identity encoded into an access token
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: &'a str,
    pub name: &'a str,
    pub roles: Vec<String>,
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_exp_secs: u64,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let secret = config.security.jwt_secret.expose_secret();

        // HS256 needs at least 32 bytes of key material
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_exp_secs: config.security.access_token_exp_secs,
        })
    }

    pub fn access_token_exp_secs(&self) -> u64 {
        self.access_token_exp_secs
    }

    /// Generate access token
    pub fn generate_access_token(&self, subject: TokenSubject<'_>) -> Result<String, AppError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(self.access_token_exp_secs as i64);

        let claims = Claims {
            sub: subject.user_id.to_string(),
            tenant_id: subject.tenant_id.to_string(),
            email: subject.email.to_string(),
            name: subject.name.to_string(),
            roles: subject.roles,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            AppError::Internal(format!("Failed to encode access token: {}", e))
        })
    }

    /// Validate and decode token
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        Ok(decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AppError::Unauthorized
            })?
            .claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use secrecy::Secret;

    fn subject(user_id: Uuid, tenant_id: Uuid) -> TokenSubject<'static> {
        TokenSubject {
            user_id,
            tenant_id,
            email: "teacher@school.test",
            name: "Ms Teacher",
            roles: vec!["Teacher".to_string()],
        }
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let token = service
            .generate_access_token(subject(user_id, tenant_id))
            .unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.tenant_id, tenant_id.to_string());
        assert_eq!(claims.email, "teacher@school.test");
        assert!(claims.roles.contains(&"Teacher".to_string()));
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_token_signed_with_other_secret_fails() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let mut other_config = test_config();
        other_config.security.jwt_secret =
            Secret::new("another_secret_key_32_characters_long".to_string());
        let other = JwtService::from_config(&other_config).unwrap();

        let token = other
            .generate_access_token(subject(Uuid::new_v4(), Uuid::new_v4()))
            .unwrap();
        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn test_invalid_token_fails() {
        let service = JwtService::from_config(&test_config()).unwrap();
        assert!(service.validate_token("invalid_token").is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = test_config();
        config.security.jwt_secret = Secret::new("short".to_string());
        assert!(JwtService::from_config(&config).is_err());
    }
}
