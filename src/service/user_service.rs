//! 用户资料服务
//!
//! 读写入口都先过限流管线：读走全局 user-detail 作用域，
//! 写走按操作者计数的 user-update 作用域。
//! partial-update 携带新邮箱时转入邮箱变更流程（镜像令牌 + 确认）。

use std::sync::Arc;

use crate::error::{GateError, Result};
use crate::model::account::Account;
use crate::repository::account_repo::AccountRepository;
use crate::service::lifecycle_service::AccountLifecycleService;
use crate::throttle::resolver::ActionScopeResolver;
use crate::throttle::scope::{AttemptOutcome, ThrottleActor};

/// 资料变更（None = 不改动该字段）
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    /// 新邮箱：不直接生效，转入邮箱变更确认流程
    pub email: Option<String>,
}

/// 用户资料服务
pub struct UserService {
    repo: Arc<dyn AccountRepository>,
    resolver: Arc<ActionScopeResolver>,
    lifecycle: Arc<AccountLifecycleService>,
}

impl UserService {
    pub fn new(
        repo: Arc<dyn AccountRepository>,
        resolver: Arc<ActionScopeResolver>,
        lifecycle: Arc<AccountLifecycleService>,
    ) -> Self {
        Self {
            repo,
            resolver,
            lifecycle,
        }
    }

    /// 按 ID 读取资料
    pub async fn retrieve(&self, account_id: u64, actor: &ThrottleActor) -> Result<Account> {
        self.gated(
            "retrieve",
            actor,
            self.find_required(account_id),
        )
        .await
    }

    /// 按用户名读取资料
    pub async fn by_username(&self, username: &str, actor: &ThrottleActor) -> Result<Account> {
        let lookup = async {
            self.repo
                .find_by_username_or_email(username)
                .await?
                .ok_or_else(|| GateError::AccountNotFound(username.to_string()))
        };
        self.gated("by-username", actor, lookup).await
    }

    /// 部分更新资料
    pub async fn partial_update(
        &self,
        account_id: u64,
        update: ProfileUpdate,
        actor: &ThrottleActor,
    ) -> Result<Account> {
        let apply = self.apply_update(account_id, update);
        self.gated("partial-update", actor, apply).await
    }

    /// 全量更新资料（语义同部分更新，走 update 动作的配额）
    pub async fn update(
        &self,
        account_id: u64,
        update: ProfileUpdate,
        actor: &ThrottleActor,
    ) -> Result<Account> {
        let apply = self.apply_update(account_id, update);
        self.gated("update", actor, apply).await
    }

    async fn apply_update(&self, account_id: u64, update: ProfileUpdate) -> Result<Account> {
        // 邮箱不直接写入：先走镜像令牌流程，确认后才生效
        if let Some(new_email) = &update.email {
            self.lifecycle
                .request_email_change(account_id, new_email)
                .await?;
        }

        let mut account = self.find_required(account_id).await?;
        let mut changed: Vec<&str> = Vec::new();

        if let Some(full_name) = update.full_name {
            account.full_name = full_name;
            changed.push("full_name");
        }
        if let Some(bio) = update.bio {
            account.bio = bio;
            changed.push("bio");
        }

        if !changed.is_empty() {
            self.repo.save(&account, &changed).await?;
        }
        // 镜像字段刚被生命周期服务更新过，重读一次保持一致
        self.find_required(account_id).await
    }

    async fn find_required(&self, account_id: u64) -> Result<Account> {
        self.repo
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| GateError::AccountNotFound(account_id.to_string()))
    }

    /// 限流管线：先准入，业务结束后按结果记录
    async fn gated<F>(&self, action: &str, actor: &ThrottleActor, op: F) -> Result<Account>
    where
        F: std::future::Future<Output = Result<Account>>,
    {
        let decision = self.resolver.check_action(action, actor).await?;
        if !decision.allowed {
            return Err(GateError::RateLimited {
                retry_after: decision.retry_after,
            });
        }

        let result = op.await;

        let outcome = if result.is_ok() {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::Failure
        };
        self.resolver.record_action(action, actor, outcome).await?;

        result
    }
}
