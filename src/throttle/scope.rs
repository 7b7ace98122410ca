//! 限流作用域与速率策略
//!
//! 每个作用域有独立的速率策略 (max_count, window)、身份维度（全局/按操作者）
//! 和记录策略（无条件/仅成功/仅失败）。未配置速率的作用域视为关闭。

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// 速率策略：窗口内最多允许 max_count 次可记录的尝试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    /// 窗口内允许的最大次数
    pub max_count: u32,
    /// 滑动窗口长度
    pub window: Duration,
}

impl RatePolicy {
    pub fn new(max_count: u32, window: Duration) -> Self {
        Self { max_count, window }
    }

    /// 解析 "N/period" 形式的速率串，period 取首字母：s/m/h/d
    ///
    /// 例如 "1/min"、"3/s"、"100/day"
    pub fn parse(rate: &str) -> Result<Self> {
        let (num, period) = rate.split_once('/').ok_or_else(|| {
            GateError::Configuration(format!("Invalid throttle rate: {}", rate))
        })?;

        let max_count: u32 = num.trim().parse().map_err(|_| {
            GateError::Configuration(format!("Invalid throttle rate count: {}", rate))
        })?;
        if max_count == 0 {
            return Err(GateError::Configuration(format!(
                "Throttle rate count must be positive: {}",
                rate
            )));
        }

        let seconds = match period.trim().chars().next() {
            Some('s') => 1,
            Some('m') => 60,
            Some('h') => 3600,
            Some('d') => 86400,
            _ => {
                return Err(GateError::Configuration(format!(
                    "Invalid throttle rate period: {}",
                    rate
                )))
            }
        };

        Ok(Self {
            max_count,
            window: Duration::from_secs(seconds),
        })
    }

    /// 解析可空速率配置，None 表示作用域关闭
    pub fn parse_optional(rate: Option<&str>) -> Result<Option<Self>> {
        match rate {
            Some(r) => Ok(Some(Self::parse(r)?)),
            None => Ok(None),
        }
    }
}

/// 身份维度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// 全局共享一个计数器（保护操作本身，而不是单个操作者）
    Global,
    /// 按操作者计数：已认证用户按用户 ID，匿名按来源地址
    PerActor,
}

/// 记录策略：哪些结果计入历史
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPolicy {
    /// 每次被放行的尝试都记录
    Unconditional,
    /// 仅成功时记录（如注册成功限流）
    SuccessOnly,
    /// 仅失败时记录（如登录失败限流）
    FailureOnly,
}

/// 尝试结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
}

impl RecordPolicy {
    /// 该结果是否应计入历史
    pub fn matches(&self, outcome: AttemptOutcome) -> bool {
        match self {
            RecordPolicy::Unconditional => true,
            RecordPolicy::SuccessOnly => outcome == AttemptOutcome::Success,
            RecordPolicy::FailureOnly => outcome == AttemptOutcome::Failure,
        }
    }
}

/// 限流身份：区分消耗的是谁的配额
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThrottleIdentity {
    /// 全局作用域的固定哨兵
    Global,
    /// 稳定用户 ID
    User(u64),
    /// 网络来源标识
    Source(String),
}

impl fmt::Display for ThrottleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleIdentity::Global => write!(f, "global"),
            ThrottleIdentity::User(id) => write!(f, "user:{}", id),
            ThrottleIdentity::Source(addr) => write!(f, "src:{}", addr),
        }
    }
}

/// 发起操作的主体（请求层提供）
#[derive(Debug, Clone, Default)]
pub struct ThrottleActor {
    /// 已认证用户 ID
    pub user_id: Option<u64>,
    /// 来源网络地址
    pub source: Option<String>,
}

impl ThrottleActor {
    /// 已认证用户
    pub fn user(user_id: u64, source: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            source: Some(source.into()),
        }
    }

    /// 匿名请求（仅来源地址）
    pub fn anonymous(source: impl Into<String>) -> Self {
        Self {
            user_id: None,
            source: Some(source.into()),
        }
    }
}

/// 限流作用域
#[derive(Debug, Clone)]
pub struct ThrottleScope {
    name: String,
    rate: Option<RatePolicy>,
    identity: IdentityKind,
    record: RecordPolicy,
}

impl ThrottleScope {
    pub fn new(
        name: impl Into<String>,
        rate: Option<RatePolicy>,
        identity: IdentityKind,
        record: RecordPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            rate,
            identity,
            record,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// None 表示作用域关闭：永远放行、从不记录
    pub fn rate(&self) -> Option<RatePolicy> {
        self.rate
    }

    pub fn record_policy(&self) -> RecordPolicy {
        self.record
    }

    /// 解析该作用域下操作者对应的限流身份
    pub fn identity_for(&self, actor: &ThrottleActor) -> ThrottleIdentity {
        match self.identity {
            IdentityKind::Global => ThrottleIdentity::Global,
            IdentityKind::PerActor => match actor.user_id {
                Some(id) => ThrottleIdentity::User(id),
                None => ThrottleIdentity::Source(
                    actor.source.clone().unwrap_or_else(|| "unknown".to_string()),
                ),
            },
        }
    }

    /// 存储 key：scope 与 identity 各占一段
    pub fn cache_key(&self, identity: &ThrottleIdentity) -> String {
        format!("throttle:{}:{}", self.name, identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(
            RatePolicy::parse("1/min").unwrap(),
            RatePolicy::new(1, Duration::from_secs(60))
        );
        assert_eq!(
            RatePolicy::parse("3/s").unwrap(),
            RatePolicy::new(3, Duration::from_secs(1))
        );
        assert_eq!(
            RatePolicy::parse("100/day").unwrap(),
            RatePolicy::new(100, Duration::from_secs(86400))
        );
        assert_eq!(
            RatePolicy::parse("5/hour").unwrap(),
            RatePolicy::new(5, Duration::from_secs(3600))
        );
    }

    #[test]
    fn test_parse_rate_rejects_garbage() {
        assert!(RatePolicy::parse("fast").is_err());
        assert!(RatePolicy::parse("x/min").is_err());
        assert!(RatePolicy::parse("3/fortnight").is_err());
        assert!(RatePolicy::parse("0/min").is_err());
    }

    #[test]
    fn test_record_policy_matches() {
        assert!(RecordPolicy::Unconditional.matches(AttemptOutcome::Success));
        assert!(RecordPolicy::Unconditional.matches(AttemptOutcome::Failure));
        assert!(RecordPolicy::SuccessOnly.matches(AttemptOutcome::Success));
        assert!(!RecordPolicy::SuccessOnly.matches(AttemptOutcome::Failure));
        assert!(RecordPolicy::FailureOnly.matches(AttemptOutcome::Failure));
        assert!(!RecordPolicy::FailureOnly.matches(AttemptOutcome::Success));
    }

    #[test]
    fn test_identity_for_global_scope() {
        let scope = ThrottleScope::new(
            "register-success",
            Some(RatePolicy::parse("1/min").unwrap()),
            IdentityKind::Global,
            RecordPolicy::SuccessOnly,
        );

        // 全局作用域不区分调用方
        let a = scope.identity_for(&ThrottleActor::user(1, "10.0.0.1"));
        let b = scope.identity_for(&ThrottleActor::anonymous("10.0.0.2"));
        assert_eq!(a, ThrottleIdentity::Global);
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_for_per_actor_scope() {
        let scope = ThrottleScope::new(
            "user-update",
            Some(RatePolicy::parse("10/min").unwrap()),
            IdentityKind::PerActor,
            RecordPolicy::Unconditional,
        );

        assert_eq!(
            scope.identity_for(&ThrottleActor::user(7, "10.0.0.1")),
            ThrottleIdentity::User(7)
        );
        assert_eq!(
            scope.identity_for(&ThrottleActor::anonymous("10.0.0.2")),
            ThrottleIdentity::Source("10.0.0.2".to_string())
        );
    }

    #[test]
    fn test_cache_key_format() {
        let scope = ThrottleScope::new(
            "login-fail",
            None,
            IdentityKind::Global,
            RecordPolicy::FailureOnly,
        );
        assert_eq!(
            scope.cache_key(&ThrottleIdentity::Global),
            "throttle:login-fail:global"
        );
        assert_eq!(
            scope.cache_key(&ThrottleIdentity::User(42)),
            "throttle:login-fail:user:42"
        );
    }
}
