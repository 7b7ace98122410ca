//! 滑动窗口限流器
//!
//! 准入与记录分离：请求入口先 check，业务结束后按结果 record。
//! 历史按「新的在前」存储，长度不超过 max_count，TTL 等于窗口长度，
//! 所以存储会自行淘汰完全过期的 key。
//!
//! 存储不可用时默认放行（fail-open）：宁可放过配额，也不能把整个系统
//! 的登录/注册锁死。该取舍可通过 fail_open=false 关闭。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{GateError, Result};
use crate::infra::clock::Clock;
use crate::infra::counter_store::CounterStore;
use crate::throttle::scope::{AttemptOutcome, ThrottleIdentity, ThrottleScope};

/// 限流判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleDecision {
    /// 是否放行
    pub allowed: bool,
    /// 拒绝时建议的重试等待（秒）
    pub retry_after: Option<u64>,
}

impl ThrottleDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    pub fn deny(retry_after: u64) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

/// 滑动窗口限流器
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    /// 存储不可用时是否放行
    fail_open: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, fail_open: bool) -> Self {
        Self {
            store,
            clock,
            fail_open,
        }
    }

    /// 准入判定
    ///
    /// 窗口内未过期的记录数达到 max_count 即拒绝（>= 比较，
    /// 即第 max_count+1 次可记录的尝试被拒）。关闭的作用域直接放行，
    /// 不产生任何存储往返。
    pub async fn check(
        &self,
        scope: &ThrottleScope,
        identity: &ThrottleIdentity,
    ) -> Result<ThrottleDecision> {
        let rate = match scope.rate() {
            Some(rate) => rate,
            None => return Ok(ThrottleDecision::allow()),
        };

        let key = scope.cache_key(identity);
        let history = match self.store.get(&key).await {
            Ok(history) => history.unwrap_or_default(),
            Err(e) => return self.on_store_error(e).map(|_| ThrottleDecision::allow()),
        };

        let now = self.clock.now_millis();
        let window_ms = rate.window.as_millis() as i64;
        let counted = prune_expired(history, now, window_ms);

        if counted.len() >= rate.max_count as usize {
            // 等最老一条计数记录滑出窗口
            let retry_after = counted
                .last()
                .map(|oldest| {
                    let remaining_ms = (oldest + window_ms - now).max(0);
                    (remaining_ms as u64).div_ceil(1000)
                })
                .unwrap_or(rate.window.as_secs());

            debug!(
                scope = scope.name(),
                identity = %identity,
                count = counted.len(),
                retry_after,
                "throttled"
            );
            return Ok(ThrottleDecision::deny(retry_after));
        }

        Ok(ThrottleDecision::allow())
    }

    /// 按作用域的记录策略写入一次尝试
    ///
    /// 结果与策略不匹配（如 login-fail 作用域收到成功结果）时为空操作。
    pub async fn record(
        &self,
        scope: &ThrottleScope,
        identity: &ThrottleIdentity,
        outcome: AttemptOutcome,
    ) -> Result<()> {
        let rate = match scope.rate() {
            Some(rate) => rate,
            None => return Ok(()),
        };
        if !scope.record_policy().matches(outcome) {
            return Ok(());
        }

        let key = scope.cache_key(identity);
        let history = match self.store.get(&key).await {
            Ok(history) => history.unwrap_or_default(),
            Err(e) => return self.on_store_error(e),
        };

        let now = self.clock.now_millis();
        let window_ms = rate.window.as_millis() as i64;
        let mut history = prune_expired(history, now, window_ms);

        // 新记录插到最前，历史长度不超过 max_count
        history.insert(0, now);
        history.truncate(rate.max_count as usize);

        if let Err(e) = self.store.set(&key, history, rate.window).await {
            return self.on_store_error(e);
        }
        Ok(())
    }

    /// fail-open：吞掉存储错误并告警；fail-closed：原样上抛
    fn on_store_error(&self, e: GateError) -> Result<()> {
        if self.fail_open {
            warn!("计数存储不可用，按 fail-open 放行: {}", e);
            Ok(())
        } else {
            Err(e)
        }
    }
}

/// 丢弃滑出窗口的记录（ts <= now - window 即过期）
fn prune_expired(history: Vec<i64>, now: i64, window_ms: i64) -> Vec<i64> {
    history
        .into_iter()
        .filter(|ts| *ts > now - window_ms)
        .collect()
}
