use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 核心错误类型
///
/// 限流类错误与校验类错误必须可区分（客户端据此选择退避或修正后重试），
/// 所以这里用独立的枚举变体而不是字符串分类。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GateError {
    /// 触发限流（附带建议的重试等待秒数）
    RateLimited {
        /// 距最老一条计数记录滑出窗口还需的秒数
        retry_after: Option<u64>,
    },
    /// 令牌无效（签名不匹配或格式错误）
    InvalidToken,
    /// 令牌已过期
    ExpiredToken,
    /// 令牌用途不匹配
    PurposeMismatch,
    /// 邮箱已被其他账号占用
    DuplicatedEmail,
    /// 邮箱格式无效或域名不在白名单内
    InvalidEmail(String),
    /// 计数存储不可用（仅在 fail_open=false 时向上抛出）
    StoreUnavailable(String),
    /// 账号未找到
    AccountNotFound(String),
    /// 校验错误
    Validation(String),
    /// 配置错误
    Configuration(String),
    /// 内部错误
    Internal(String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::RateLimited { retry_after } => match retry_after {
                Some(secs) => write!(f, "Rate limited: retry after {} seconds", secs),
                None => write!(f, "Rate limited"),
            },
            GateError::InvalidToken => write!(f, "Invalid token"),
            GateError::ExpiredToken => write!(f, "Token expired"),
            GateError::PurposeMismatch => write!(f, "Token purpose mismatch"),
            GateError::DuplicatedEmail => write!(f, "Duplicated email"),
            GateError::InvalidEmail(msg) => write!(f, "Not valid email: {}", msg),
            GateError::StoreUnavailable(msg) => write!(f, "Counter store unavailable: {}", msg),
            GateError::AccountNotFound(msg) => write!(f, "Account not found: {}", msg),
            GateError::Validation(msg) => write!(f, "Validation error: {}", msg),
            GateError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            GateError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for GateError {}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, GateError>;

/// 错误代码
///
/// 分段规则：1xxx 校验/业务、2xxx 基础设施、3xxx 限流、5xxx 令牌
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// 校验错误
    Validation = 1000,
    /// 账号未找到
    AccountNotFound = 1001,
    /// 邮箱重复
    DuplicatedEmail = 1002,
    /// 邮箱无效
    InvalidEmail = 1003,
    /// 内部错误
    Internal = 2000,
    /// 配置错误
    Configuration = 2001,
    /// 计数存储不可用
    StoreUnavailable = 2002,
    /// 触发限流
    RateLimited = 3000,
    /// 令牌无效
    InvalidToken = 5000,
    /// 令牌过期
    ExpiredToken = 5001,
    /// 令牌用途不匹配
    PurposeMismatch = 5002,
}

impl From<&GateError> for ErrorCode {
    fn from(error: &GateError) -> Self {
        match error {
            GateError::RateLimited { .. } => ErrorCode::RateLimited,
            GateError::InvalidToken => ErrorCode::InvalidToken,
            GateError::ExpiredToken => ErrorCode::ExpiredToken,
            GateError::PurposeMismatch => ErrorCode::PurposeMismatch,
            GateError::DuplicatedEmail => ErrorCode::DuplicatedEmail,
            GateError::InvalidEmail(_) => ErrorCode::InvalidEmail,
            GateError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            GateError::AccountNotFound(_) => ErrorCode::AccountNotFound,
            GateError::Validation(_) => ErrorCode::Validation,
            GateError::Configuration(_) => ErrorCode::Configuration,
            GateError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl GateError {
    /// 是否为限流错误（客户端应退避而不是修正参数）
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GateError::RateLimited { .. })
    }

    /// 错误代码
    pub fn code(&self) -> ErrorCode {
        ErrorCode::from(self)
    }
}
