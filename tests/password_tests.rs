//! 密码哈希与密码策略测试

use school_system::auth::password::PasswordHasher;
use school_system::error::AppError;

mod common;

fn hasher() -> PasswordHasher {
    let config = common::test_config();
    PasswordHasher::from_config(&config.security).expect("valid argon2 params")
}

#[test]
fn test_password_hash_and_verify() {
    let hasher = hasher();
    let hash = hasher.hash("TestPassword123").unwrap();

    assert!(hash.starts_with("$argon2id$"));
    hasher.verify("TestPassword123", &hash).unwrap();
}

#[test]
fn test_wrong_password_is_unauthorized() {
    let hasher = hasher();
    let hash = hasher.hash("TestPassword123").unwrap();

    let err = hasher.verify("WrongPassword123", &hash).unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
}

#[test]
fn test_same_password_different_salt() {
    let hasher = hasher();
    let first = hasher.hash("TestPassword123").unwrap();
    let second = hasher.hash("TestPassword123").unwrap();

    assert_ne!(first, second);
    hasher.verify("TestPassword123", &first).unwrap();
    hasher.verify("TestPassword123", &second).unwrap();
}

#[test]
fn test_malformed_hash_is_internal_error() {
    let err = hasher().verify("whatever", "not-a-phc-string").unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
}

#[test]
fn test_invalid_argon2_params_rejected() {
    assert!(matches!(
        PasswordHasher::with_cost(1, 1),
        Err(AppError::Config(_))
    ));
}

// ==================== 密码策略 ====================

#[test]
fn test_policy_accepts_strong_password() {
    let config = common::test_config();
    assert!(PasswordHasher::validate_password_policy("Passw0rdXY", &config.security).is_ok());
}

#[test]
fn test_policy_rejections_name_password_field() {
    let config = common::test_config();

    for weak in ["Sh0rt", "alllowercase1", "NoDigitsHere"] {
        match PasswordHasher::validate_password_policy(weak, &config.security) {
            Err(AppError::Validation { fields, .. }) => assert!(fields.contains_key("password")),
            other => panic!("{} should be rejected, got {:?}", weak, other),
        }
    }
}

#[test]
fn test_policy_respects_relaxed_config() {
    let mut config = common::test_config();
    config.security.password_require_uppercase = false;
    config.security.password_require_digit = false;

    assert!(PasswordHasher::validate_password_policy("plainpassword", &config.security).is_ok());
}
