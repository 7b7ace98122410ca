//! 账号生命周期协调器
//!
//! 三种转换：密码找回、邮箱变更确认、账号注销。
//! 找回/改邮箱令牌同时镜像在账号记录上以支持单次使用：
//! 确认成功的同一次保存里清空镜像字段，同值令牌的重放随即失效。
//! 注销令牌不落库，由签名按 (subject, purpose) 推导，重放安全来自注销幂等。

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::password::MIN_PASSWORD_LEN;
use crate::auth::token_service::{TokenPurpose, TokenService};
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::infra::clock::Clock;
use crate::infra::named_lock::NamedLocks;
use crate::model::account::Account;
use crate::repository::account_repo::AccountRepository;
use crate::service::notification_service::Notifier;
use crate::service::validators;
use crate::slug::{slug_candidate, slugify};

/// 注销临界区的锁名
const DELETE_USER_LOCK: &str = "delete-user";

/// 账号生命周期服务
pub struct AccountLifecycleService {
    repo: Arc<dyn AccountRepository>,
    tokens: Arc<TokenService>,
    notifier: Arc<dyn Notifier>,
    locks: Arc<NamedLocks>,
    clock: Arc<dyn Clock>,
    config: Arc<GateConfig>,
}

impl AccountLifecycleService {
    pub fn new(
        repo: Arc<dyn AccountRepository>,
        tokens: Arc<TokenService>,
        notifier: Arc<dyn Notifier>,
        locks: Arc<NamedLocks>,
        clock: Arc<dyn Clock>,
        config: Arc<GateConfig>,
    ) -> Self {
        Self {
            repo,
            tokens,
            notifier,
            locks,
            clock,
            config,
        }
    }

    // ============================================================
    // 密码找回
    // ============================================================

    /// 发起密码找回：生成镜像令牌并通知
    ///
    /// 再次发起会覆盖旧令牌，旧令牌随即失效（后发优先）。
    pub async fn request_password_recovery(&self, username_or_email: &str) -> Result<()> {
        if username_or_email.is_empty() {
            return Err(GateError::Validation("Invalid username or email".to_string()));
        }

        let mut account = self
            .repo
            .find_by_username_or_email(username_or_email)
            .await?
            .ok_or_else(|| {
                GateError::AccountNotFound("Username or email does not match any account".to_string())
            })?;

        account.recovery_token = Some(Uuid::new_v4().to_string());
        self.repo.save(&account, &["recovery_token"]).await?;

        info!(account_id = account.id, "password recovery requested");
        self.notify(
            "password_recovery",
            &account.email,
            json!({ "user_id": account.id, "username": account.username }),
        )
        .await;
        Ok(())
    }

    /// 用找回令牌设置新密码，并在同一次保存里清空镜像
    pub async fn change_password_from_recovery(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<()> {
        if token.is_empty() {
            return Err(GateError::InvalidToken);
        }

        let mut account = self
            .repo
            .find_by_recovery_token(token)
            .await?
            .ok_or(GateError::InvalidToken)?;

        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(GateError::Validation(format!(
                "Invalid password length, at least {} characters needed",
                MIN_PASSWORD_LEN
            )));
        }

        account.set_password(new_password)?;
        account.recovery_token = None;
        self.repo
            .save(&account, &["password_hash", "recovery_token"])
            .await?;

        info!(account_id = account.id, "password changed from recovery token");
        Ok(())
    }

    // ============================================================
    // 邮箱变更
    // ============================================================

    /// 发起邮箱变更：校验后设置镜像令牌与待确认邮箱
    ///
    /// 校验顺序：与当前邮箱相同 → InvalidEmail（见 DESIGN.md 的取舍记录）；
    /// 已被其他账号占用 → DuplicatedEmail；格式或域名不合规 → InvalidEmail。
    /// 已有未确认的变更会被原子覆盖（后发优先，不排队）。
    pub async fn request_email_change(&self, account_id: u64, new_email: &str) -> Result<()> {
        let mut account = self
            .repo
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| GateError::AccountNotFound(account_id.to_string()))?;

        if new_email == account.email {
            return Err(GateError::InvalidEmail(
                "new email matches current email".to_string(),
            ));
        }
        if self.repo.exists_with_email(new_email).await? {
            return Err(GateError::DuplicatedEmail);
        }
        validators::validate_email(new_email, &self.config.email.allowed_domains)?;

        account.email_token = Some(Uuid::new_v4().to_string());
        account.new_email = Some(new_email.to_string());
        self.repo
            .save(&account, &["email_token", "new_email"])
            .await?;

        info!(account_id = account.id, "email change requested");
        self.notify(
            "change_email",
            new_email,
            json!({ "user_id": account.id, "username": account.username }),
        )
        .await;
        Ok(())
    }

    /// 用镜像令牌确认邮箱变更
    pub async fn confirm_email_change(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(GateError::InvalidToken);
        }

        let mut account = self
            .repo
            .find_by_email_token(token)
            .await?
            .ok_or(GateError::InvalidToken)?;

        let new_email = account.new_email.clone().ok_or(GateError::InvalidToken)?;
        let old_email = std::mem::replace(&mut account.email, new_email);
        account.new_email = None;
        account.email_token = None;
        self.repo
            .save(&account, &["email", "new_email", "email_token"])
            .await?;

        info!(account_id = account.id, "email change confirmed");
        self.notify(
            "email_changed",
            &account.email,
            json!({
                "user_id": account.id,
                "old_email": old_email,
                "new_email": account.email,
            }),
        )
        .await;
        Ok(())
    }

    // ============================================================
    // 账号注销
    // ============================================================

    /// 签发长效注销令牌（由签名推导，不落库）
    pub fn issue_cancel_token(&self, account_id: u64) -> Result<String> {
        self.tokens.issue(account_id, TokenPurpose::CancelAccount)
    }

    /// 持注销令牌注销账号
    pub async fn cancel_with_token(&self, token: &str) -> Result<()> {
        let subject_id = self.tokens.verify(
            token,
            TokenPurpose::CancelAccount,
            Some(self.config.token.cancel_account_max_age()),
        )?;

        // 未知主体按无效令牌处理，不泄露账号是否存在
        let account = self
            .repo
            .find_by_id(subject_id)
            .await?
            .ok_or(GateError::InvalidToken)?;

        self.cancel(account).await
    }

    /// 所有者直接注销
    pub async fn destroy(&self, account_id: u64) -> Result<()> {
        let account = self
            .repo
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| GateError::AccountNotFound(account_id.to_string()))?;
        self.cancel(account).await
    }

    /// 注销：终态转换，PII 抹除 + 用户名匿名化
    ///
    /// 已注销账号再次注销是空操作。匿名用户名在命名锁内生成，
    /// 冲突追加数字后缀直到唯一。
    async fn cancel(&self, mut account: Account) -> Result<()> {
        if !account.is_active {
            debug!(account_id = account.id, "account already cancelled, noop");
            return Ok(());
        }

        let _guard = self.locks.acquire(DELETE_USER_LOCK).await;

        let base = slugify(&format!("deleted-user-{}", self.clock.now_millis()));
        let mut n = 0u32;
        let username = loop {
            let candidate = slug_candidate(&base, n);
            if !self.repo.exists_with_username(&candidate).await? {
                break candidate;
            }
            n += 1;
        };

        account.username = username;
        account.email = format!("{}@{}", account.username, self.config.email.default_domain);
        account.is_active = false;
        account.full_name = "Deleted user".to_string();
        account.bio = String::new();
        account.photo = None;
        account.recovery_token = None;
        account.email_token = None;
        account.new_email = None;
        account.set_unusable_password();

        self.repo
            .save(
                &account,
                &[
                    "username",
                    "email",
                    "is_active",
                    "full_name",
                    "bio",
                    "photo",
                    "recovery_token",
                    "email_token",
                    "new_email",
                    "password_hash",
                ],
            )
            .await?;

        info!(account_id = account.id, username = %account.username, "account cancelled");
        Ok(())
    }

    /// fire-and-forget 通知：失败只告警，不影响转换结果
    async fn notify(&self, template: &str, recipient: &str, context: Value) {
        if let Err(e) = self.notifier.send(template, recipient, context).await {
            warn!(template, recipient, "notification failed: {}", e);
        }
    }
}
