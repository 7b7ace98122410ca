use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::infra::clock::Clock;

/// 生命周期令牌的用途标签
///
/// 用途写进签名负载，verify 时必须匹配，防止把注销令牌拿去改邮箱。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    /// 密码找回
    PasswordRecovery,
    /// 邮箱变更确认
    EmailChange,
    /// 账号注销
    CancelAccount,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::PasswordRecovery => "password-recovery",
            TokenPurpose::EmailChange => "email-change",
            TokenPurpose::CancelAccount => "cancel-account",
        }
    }
}

/// 令牌负载
#[derive(Debug, Serialize, Deserialize)]
struct LifecycleClaims {
    /// 主体（账号 ID）
    sub: String,
    /// 用途标签
    purpose: String,
    /// 签发时刻（秒时间戳）
    iat: i64,
}

/// 生命周期令牌签发与验证服务 (HS256 对称签名)
///
/// 服务本身无状态：不保存任何已签发的令牌，最大年龄由调用方按用途传入。
/// 签名密钥为进程级配置，启动时加载一次。
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// 创建令牌服务
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            clock,
        }
    }

    /// 签发令牌
    pub fn issue(&self, subject_id: u64, purpose: TokenPurpose) -> Result<String> {
        let claims = LifecycleClaims {
            sub: subject_id.to_string(),
            purpose: purpose.as_str().to_string(),
            iat: self.clock.now().timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| GateError::Internal(format!("令牌签发失败: {}", e)))
    }

    /// 验证令牌并返回主体 ID
    ///
    /// 失败分三类：签名/格式错误 InvalidToken、用途不匹配 PurposeMismatch、
    /// 超过 max_age 则 ExpiredToken。max_age = None 表示不限年龄。
    pub fn verify(
        &self,
        token: &str,
        purpose: TokenPurpose,
        max_age: Option<Duration>,
    ) -> Result<u64> {
        // 年龄校验用注入时钟自行处理，不依赖 exp claim
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let data = decode::<LifecycleClaims>(token, &self.decoding_key, &validation)
            .map_err(|_e| GateError::InvalidToken)?;

        if data.claims.purpose != purpose.as_str() {
            return Err(GateError::PurposeMismatch);
        }

        if let Some(max_age) = max_age {
            let age = self.clock.now().timestamp() - data.claims.iat;
            if age > max_age.num_seconds() {
                return Err(GateError::ExpiredToken);
            }
        }

        data.claims
            .sub
            .parse::<u64>()
            .map_err(|_| GateError::InvalidToken)
    }
}
