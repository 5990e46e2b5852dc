//! Password hashing and verification using Argon2id

use crate::{config::SecurityConfig, error::AppError};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Password hasher with configurable parameters
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher with default parameters (OWASP recommended)
    pub fn new() -> Self {
        // m=64MiB, t=3 iterations, p=4 lanes; constants are always valid
        Self::from_params(Params::new(65536, 3, 4, None).unwrap_or_default())
    }

    /// Hasher with explicit memory (KiB) and iteration cost
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| AppError::Config(format!("Invalid Argon2 params: {}", e)))?;
        Ok(Self::from_params(params))
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        Self::with_cost(config.argon2_memory_kib, config.argon2_iterations)
    }

    fn from_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), AppError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::debug!("Failed to parse password hash: {:?}", e);
            AppError::Internal(format!("Failed to parse password hash: {}", e))
        })?;

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AppError::Unauthorized)
    }

    /// Validate password against policy
    pub fn validate_password_policy(password: &str, policy: &SecurityConfig) -> Result<(), AppError> {
        if password.chars().count() < policy.password_min_length {
            return Err(AppError::invalid_field(
                "password",
                format!(
                    "Password must be at least {} characters",
                    policy.password_min_length
                ),
            ));
        }

        if policy.password_require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AppError::invalid_field(
                "password",
                "Password must contain at least one uppercase letter",
            ));
        }

        if policy.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::invalid_field(
                "password",
                "Password must contain at least one digit",
            ));
        }

        Ok(())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    fn cheap_hasher() -> PasswordHasher {
        PasswordHasher::with_cost(1024, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = cheap_hasher();
        let password = "TestPassword123!";

        let hash = hasher.hash(password).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        hasher.verify(password, &hash).unwrap();
    }

    #[test]
    fn test_verify_fails_with_wrong_password() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("TestPassword123!").unwrap();

        assert!(matches!(
            hasher.verify("WrongPassword", &hash),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_hash_is_different_each_time() {
        let hasher = cheap_hasher();
        let password = "TestPassword123!";

        let hash1 = hasher.hash(password).unwrap();
        let hash2 = hasher.hash(password).unwrap();

        // Hashes should be different due to salt
        assert_ne!(hash1, hash2);
        hasher.verify(password, &hash1).unwrap();
        hasher.verify(password, &hash2).unwrap();
    }

    #[test]
    fn test_hash_verifies_across_cost_settings() {
        // 参数编码在哈希串中，校验不依赖当前配置
        let hash = cheap_hasher().hash("Secret123").unwrap();
        PasswordHasher::with_cost(2048, 2)
            .unwrap()
            .verify("Secret123", &hash)
            .unwrap();
    }

    #[test]
    fn test_invalid_cost_rejected() {
        assert!(PasswordHasher::with_cost(1, 1).is_err());
    }

    #[test]
    fn test_password_policy_validation() {
        let policy = test_config().security;

        assert!(PasswordHasher::validate_password_policy("Test1234", &policy).is_ok());
        // Too short
        assert!(PasswordHasher::validate_password_policy("Test1", &policy).is_err());
        // No uppercase
        assert!(PasswordHasher::validate_password_policy("test1234", &policy).is_err());
        // No digit
        assert!(PasswordHasher::validate_password_policy("Testtest", &policy).is_err());
    }
}
