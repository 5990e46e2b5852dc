//! Authentication module

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, JwtService, TokenSubject};
pub use middleware::{authenticate, extract_token, jwt_auth_middleware, AuthContext};
pub use password::PasswordHasher;
