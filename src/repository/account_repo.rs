//! 账号仓库接口与进程内实现
//!
//! 真正的持久化（ORM/SQL）由外层应用实现，核心只依赖这组窄接口。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::model::account::Account;

/// 账号仓库接口
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// 插入新账号，id=0 时由仓库分配
    async fn create(&self, account: Account) -> Result<Account>;

    /// 按 ID 查找
    async fn find_by_id(&self, id: u64) -> Result<Option<Account>>;

    /// 按用户名或邮箱查找（不区分大小写；多个命中时退回精确匹配）
    async fn find_by_username_or_email(&self, query: &str) -> Result<Option<Account>>;

    /// 按邮箱变更令牌镜像查找
    async fn find_by_email_token(&self, token: &str) -> Result<Option<Account>>;

    /// 按密码找回令牌镜像查找
    async fn find_by_recovery_token(&self, token: &str) -> Result<Option<Account>>;

    /// 是否已有账号占用该邮箱
    async fn exists_with_email(&self, email: &str) -> Result<bool>;

    /// 是否已有账号占用该用户名（不区分大小写）
    async fn exists_with_username(&self, username: &str) -> Result<bool>;

    /// 保存账号；changed_fields 标注本次变更的字段，供实现做精确更新
    async fn save(&self, account: &Account, changed_fields: &[&str]) -> Result<()>;
}

/// 进程内账号仓库（DashMap 实现，测试与单机部署用）
pub struct MemoryAccountRepository {
    accounts: DashMap<u64, Account>,
    next_id: AtomicU64,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn find_first(&self, pred: impl Fn(&Account) -> bool) -> Option<Account> {
        self.accounts
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

impl Default for MemoryAccountRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn create(&self, mut account: Account) -> Result<Account> {
        if account.id == 0 {
            account.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        } else {
            // 保证后续分配不与显式 id 冲突
            self.next_id.fetch_max(account.id + 1, Ordering::SeqCst);
        }
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Account>> {
        Ok(self.accounts.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_username_or_email(&self, query: &str) -> Result<Option<Account>> {
        let lowered = query.to_lowercase();
        let matches: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| {
                let a = entry.value();
                a.username.to_lowercase() == lowered || a.email.to_lowercase() == lowered
            })
            .map(|entry| entry.value().clone())
            .collect();

        // 大小写变体撞车时退回精确匹配
        if matches.len() > 1 {
            return Ok(matches
                .into_iter()
                .find(|a| a.username == query || a.email == query));
        }
        Ok(matches.into_iter().next())
    }

    async fn find_by_email_token(&self, token: &str) -> Result<Option<Account>> {
        Ok(self.find_first(|a| a.email_token.as_deref() == Some(token)))
    }

    async fn find_by_recovery_token(&self, token: &str) -> Result<Option<Account>> {
        Ok(self.find_first(|a| a.recovery_token.as_deref() == Some(token)))
    }

    async fn exists_with_email(&self, email: &str) -> Result<bool> {
        Ok(self.find_first(|a| a.email == email).is_some())
    }

    async fn exists_with_username(&self, username: &str) -> Result<bool> {
        let lowered = username.to_lowercase();
        Ok(self
            .find_first(|a| a.username.to_lowercase() == lowered)
            .is_some())
    }

    async fn save(&self, account: &Account, _changed_fields: &[&str]) -> Result<()> {
        self.accounts.insert(account.id, account.clone());
        Ok(())
    }
}

/// 测试辅助：构建共享仓库
pub fn shared_memory_repo() -> Arc<MemoryAccountRepository> {
    Arc::new(MemoryAccountRepository::new())
}
