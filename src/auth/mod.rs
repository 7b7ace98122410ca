//! 认证基础件：密码哈希、生命周期令牌

pub mod password;
pub mod token_service;

pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use token_service::{TokenPurpose, TokenService};
