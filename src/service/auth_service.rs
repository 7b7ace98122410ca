//! 认证服务：登录与公共注册
//!
//! 两个入口都先过限流管线再执行业务，结束后按结果回写记录：
//! login-fail 只记失败，配额耗尽后同一身份即使密码正确也会被拒；
//! register-success 只记成功，且作用域是全局的（保护注册功能本身）。

use std::sync::Arc;

use tracing::info;

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::model::account::Account;
use crate::repository::account_repo::AccountRepository;
use crate::service::validators::{self, REGISTER_MIN_PASSWORD_LEN};
use crate::throttle::resolver::ActionScopeResolver;
use crate::throttle::scope::{AttemptOutcome, ThrottleActor};

/// 公共注册请求
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

/// 认证服务
pub struct AuthService {
    repo: Arc<dyn AccountRepository>,
    resolver: Arc<ActionScopeResolver>,
    config: Arc<GateConfig>,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn AccountRepository>,
        resolver: Arc<ActionScopeResolver>,
        config: Arc<GateConfig>,
    ) -> Self {
        Self {
            repo,
            resolver,
            config,
        }
    }

    /// 登录
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
        actor: &ThrottleActor,
    ) -> Result<Account> {
        let decision = self.resolver.check_action("login", actor).await?;
        if !decision.allowed {
            return Err(GateError::RateLimited {
                retry_after: decision.retry_after,
            });
        }

        let result = self.authenticate(username_or_email, password).await;

        let outcome = if result.is_ok() {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::Failure
        };
        self.resolver.record_action("login", actor, outcome).await?;

        result
    }

    /// 校验凭据；任何不匹配都返回同一错误，不区分账号不存在/密码错误
    async fn authenticate(&self, username_or_email: &str, password: &str) -> Result<Account> {
        let account = self
            .repo
            .find_by_username_or_email(username_or_email)
            .await?;

        match account {
            Some(account) if account.is_active && account.check_password(password) => {
                info!(account_id = account.id, "login succeeded");
                Ok(account)
            }
            _ => Err(GateError::Validation(
                "Username or password does not match user".to_string(),
            )),
        }
    }

    /// 公共注册
    pub async fn register(&self, request: RegisterRequest, actor: &ThrottleActor) -> Result<Account> {
        if !self.config.public_register_enabled {
            return Err(GateError::Validation(
                "Public register is disabled".to_string(),
            ));
        }

        let decision = self.resolver.check_action("register", actor).await?;
        if !decision.allowed {
            return Err(GateError::RateLimited {
                retry_after: decision.retry_after,
            });
        }

        let result = self.create_account(request).await;

        let outcome = if result.is_ok() {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::Failure
        };
        self.resolver
            .record_action("register", actor, outcome)
            .await?;

        result
    }

    async fn create_account(&self, request: RegisterRequest) -> Result<Account> {
        validators::validate_username(&request.username)?;
        if request.password.len() < REGISTER_MIN_PASSWORD_LEN {
            return Err(GateError::Validation(format!(
                "Password must be at least {} characters",
                REGISTER_MIN_PASSWORD_LEN
            )));
        }
        validators::validate_email(&request.email, &self.config.email.allowed_domains)?;

        if self.repo.exists_with_username(&request.username).await? {
            return Err(GateError::Validation(
                "A user with that username already exists".to_string(),
            ));
        }
        if self.repo.exists_with_email(&request.email).await? {
            return Err(GateError::DuplicatedEmail);
        }

        let mut account = Account::new(0, request.username, request.email);
        account.full_name = request.full_name;
        account.set_password(&request.password)?;
        account.ensure_email(&self.config.email.default_domain);

        let account = self.repo.create(account).await?;
        info!(account_id = account.id, username = %account.username, "account registered");
        Ok(account)
    }
}
