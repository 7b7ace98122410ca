//! 组装入口
//!
//! 从一份不可变配置构建完整的核心：限流管线、令牌服务、生命周期服务。
//! 请求层持有 AccountGate 即可调用全部能力。

use std::sync::Arc;

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::infra::clock::Clock;
use crate::infra::counter_store::CounterStore;
use crate::infra::named_lock::NamedLocks;
use crate::repository::account_repo::AccountRepository;
use crate::service::auth_service::AuthService;
use crate::service::lifecycle_service::AccountLifecycleService;
use crate::service::notification_service::Notifier;
use crate::service::user_service::UserService;
use crate::throttle::limiter::RateLimiter;
use crate::throttle::resolver::ActionScopeResolver;
use crate::throttle::scope::{IdentityKind, RatePolicy, RecordPolicy, ThrottleScope};
use crate::auth::token_service::TokenService;

/// 核心门面
pub struct AccountGate {
    pub config: Arc<GateConfig>,
    pub resolver: Arc<ActionScopeResolver>,
    pub tokens: Arc<TokenService>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub lifecycle: Arc<AccountLifecycleService>,
}

impl AccountGate {
    /// 组装核心服务
    pub fn new(
        config: GateConfig,
        store: Arc<dyn CounterStore>,
        repo: Arc<dyn AccountRepository>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.token.signing_secret.is_empty() {
            return Err(GateError::Configuration(
                "signing secret must be configured".to_string(),
            ));
        }

        let config = Arc::new(config);
        let limiter = RateLimiter::new(store, clock.clone(), config.throttle.fail_open);
        let resolver = Arc::new(Self::build_resolver(&config, limiter)?);
        let tokens = Arc::new(TokenService::new(&config.token.signing_secret, clock.clone()));

        let lifecycle = Arc::new(AccountLifecycleService::new(
            repo.clone(),
            tokens.clone(),
            notifier,
            Arc::new(NamedLocks::new()),
            clock,
            config.clone(),
        ));
        let auth = Arc::new(AuthService::new(
            repo.clone(),
            resolver.clone(),
            config.clone(),
        ));
        let users = Arc::new(UserService::new(repo, resolver.clone(), lifecycle.clone()));

        Ok(Self {
            config,
            resolver,
            tokens,
            auth,
            users,
            lifecycle,
        })
    }

    /// 内置作用域绑定表
    ///
    /// login-fail / register-success / user-detail 保护的是功能本身，全局计数；
    /// user-update 按操作者计数。未配置速率的作用域自动关闭。
    fn build_resolver(config: &GateConfig, limiter: RateLimiter) -> Result<ActionScopeResolver> {
        let t = &config.throttle;

        let resolver = ActionScopeResolver::new(limiter)
            .bind(
                ThrottleScope::new(
                    "login-fail",
                    RatePolicy::parse_optional(t.login_fail.as_deref())?,
                    IdentityKind::Global,
                    RecordPolicy::FailureOnly,
                ),
                &["login"],
            )
            .bind(
                ThrottleScope::new(
                    "register-success",
                    RatePolicy::parse_optional(t.register_success.as_deref())?,
                    IdentityKind::Global,
                    RecordPolicy::SuccessOnly,
                ),
                &["register"],
            )
            .bind(
                ThrottleScope::new(
                    "user-detail",
                    RatePolicy::parse_optional(t.user_detail.as_deref())?,
                    IdentityKind::Global,
                    RecordPolicy::Unconditional,
                ),
                &["retrieve", "by-username"],
            )
            .bind(
                ThrottleScope::new(
                    "user-update",
                    RatePolicy::parse_optional(t.user_update.as_deref())?,
                    IdentityKind::PerActor,
                    RecordPolicy::Unconditional,
                ),
                &["update", "partial-update"],
            )
            .with_whitelist(t.whitelist.clone());

        Ok(resolver)
    }
}
