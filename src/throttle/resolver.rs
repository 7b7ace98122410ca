//! 操作名到限流作用域的解析
//!
//! 以声明式绑定 (scope, throttled_actions) 组合独立的策略对象，
//! 固定管线依次询问每个命中的作用域：全部放行才算放行（逻辑与），
//! 第一个拒绝即短路，并携带该作用域的 retry-after 提示。

use tracing::{debug, warn};

use crate::error::Result;
use crate::throttle::limiter::{RateLimiter, ThrottleDecision};
use crate::throttle::scope::{AttemptOutcome, ThrottleActor, ThrottleScope};

/// 作用域绑定：该作用域管辖哪些操作
pub struct ScopeBinding {
    pub scope: ThrottleScope,
    pub actions: Vec<String>,
}

/// 操作限流解析器
pub struct ActionScopeResolver {
    bindings: Vec<ScopeBinding>,
    limiter: RateLimiter,
    /// 豁免限流的身份（用户 ID 或来源地址的字面值）
    whitelist: Vec<String>,
}

impl ActionScopeResolver {
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            bindings: Vec::new(),
            limiter,
            whitelist: Vec::new(),
        }
    }

    /// 注册一个绑定
    pub fn bind(mut self, scope: ThrottleScope, actions: &[&str]) -> Self {
        self.bindings.push(ScopeBinding {
            scope,
            actions: actions.iter().map(|a| a.to_string()).collect(),
        });
        self
    }

    /// 设置豁免名单
    pub fn with_whitelist(mut self, whitelist: Vec<String>) -> Self {
        self.whitelist = whitelist;
        self
    }

    /// 某操作需要咨询的作用域（没有绑定 = 从不限流）
    pub fn resolve(&self, action: &str) -> Vec<&ThrottleScope> {
        self.bindings
            .iter()
            .filter(|b| b.actions.iter().any(|a| a == action))
            .map(|b| &b.scope)
            .collect()
    }

    fn is_whitelisted(&self, actor: &ThrottleActor) -> bool {
        if self.whitelist.is_empty() {
            return false;
        }
        let by_user = actor
            .user_id
            .map(|id| self.whitelist.iter().any(|w| *w == id.to_string()))
            .unwrap_or(false);
        let by_source = actor
            .source
            .as_ref()
            .map(|s| self.whitelist.iter().any(|w| w == s))
            .unwrap_or(false);
        by_user || by_source
    }

    /// 准入检查：所有命中的作用域都放行才放行
    pub async fn check_action(
        &self,
        action: &str,
        actor: &ThrottleActor,
    ) -> Result<ThrottleDecision> {
        if self.is_whitelisted(actor) {
            debug!(action, "actor whitelisted, skipping throttle");
            return Ok(ThrottleDecision::allow());
        }

        for scope in self.resolve(action) {
            let identity = scope.identity_for(actor);
            let decision = self.limiter.check(scope, &identity).await?;
            if !decision.allowed {
                warn!(
                    action,
                    scope = scope.name(),
                    identity = %identity,
                    retry_after = ?decision.retry_after,
                    "action throttled"
                );
                return Ok(decision);
            }
        }

        Ok(ThrottleDecision::allow())
    }

    /// 按结果记录一次尝试，命中的每个作用域各自按记录策略过滤
    pub async fn record_action(
        &self,
        action: &str,
        actor: &ThrottleActor,
        outcome: AttemptOutcome,
    ) -> Result<()> {
        if self.is_whitelisted(actor) {
            return Ok(());
        }

        for scope in self.resolve(action) {
            let identity = scope.identity_for(actor);
            self.limiter.record(scope, &identity, outcome).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::clock::ManualClock;
    use crate::infra::counter_store::MemoryCounterStore;
    use crate::throttle::scope::{IdentityKind, RatePolicy, RecordPolicy};
    use std::sync::Arc;

    fn resolver() -> ActionScopeResolver {
        let clock = Arc::new(ManualClock::from_system());
        let store = Arc::new(MemoryCounterStore::new(clock.clone()));
        let limiter = RateLimiter::new(store, clock, true);

        ActionScopeResolver::new(limiter)
            .bind(
                ThrottleScope::new(
                    "login-fail",
                    Some(RatePolicy::parse("1/min").unwrap()),
                    IdentityKind::Global,
                    RecordPolicy::FailureOnly,
                ),
                &["login"],
            )
            .bind(
                ThrottleScope::new(
                    "user-detail",
                    Some(RatePolicy::parse("2/min").unwrap()),
                    IdentityKind::Global,
                    RecordPolicy::Unconditional,
                ),
                &["retrieve", "by-username"],
            )
            .bind(
                ThrottleScope::new(
                    "user-update",
                    Some(RatePolicy::parse("1/min").unwrap()),
                    IdentityKind::PerActor,
                    RecordPolicy::Unconditional,
                ),
                &["update", "partial-update"],
            )
    }

    #[tokio::test]
    async fn test_unbound_action_is_never_throttled() {
        let resolver = resolver();
        let actor = ThrottleActor::anonymous("10.0.0.1");

        assert!(resolver.resolve("change-avatar").is_empty());
        for _ in 0..50 {
            let decision = resolver.check_action("change-avatar", &actor).await.unwrap();
            assert!(decision.allowed);
            resolver
                .record_action("change-avatar", &actor, AttemptOutcome::Success)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_one_scope_covers_multiple_actions() {
        let resolver = resolver();
        let actor = ThrottleActor::anonymous("10.0.0.1");

        // retrieve 和 by-username 共享 user-detail 的配额
        resolver
            .record_action("retrieve", &actor, AttemptOutcome::Success)
            .await
            .unwrap();
        resolver
            .record_action("by-username", &actor, AttemptOutcome::Success)
            .await
            .unwrap();

        let decision = resolver.check_action("retrieve", &actor).await.unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_whitelisted_source_bypasses_throttle() {
        let clock = Arc::new(ManualClock::from_system());
        let store = Arc::new(MemoryCounterStore::new(clock.clone()));
        let limiter = RateLimiter::new(store, clock, true);
        let resolver = ActionScopeResolver::new(limiter)
            .bind(
                ThrottleScope::new(
                    "login-fail",
                    Some(RatePolicy::parse("1/min").unwrap()),
                    IdentityKind::Global,
                    RecordPolicy::FailureOnly,
                ),
                &["login"],
            )
            .with_whitelist(vec!["10.0.0.99".to_string()]);

        let trusted = ThrottleActor::anonymous("10.0.0.99");
        for _ in 0..10 {
            resolver
                .record_action("login", &trusted, AttemptOutcome::Failure)
                .await
                .unwrap();
            assert!(resolver.check_action("login", &trusted).await.unwrap().allowed);
        }
    }

    #[tokio::test]
    async fn test_per_actor_scope_isolates_users() {
        let resolver = resolver();
        let alice = ThrottleActor::user(1, "10.0.0.1");
        let bob = ThrottleActor::user(2, "10.0.0.1");

        resolver
            .record_action("update", &alice, AttemptOutcome::Success)
            .await
            .unwrap();

        assert!(!resolver.check_action("update", &alice).await.unwrap().allowed);
        assert!(resolver.check_action("update", &bob).await.unwrap().allowed);
        // partial-update 与 update 共享同一作用域
        assert!(!resolver
            .check_action("partial-update", &alice)
            .await
            .unwrap()
            .allowed);
    }
}
