use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::password::{hash_password, verify_password};
use crate::error::Result;

/// 账号记录
///
/// 核心只读写生命周期相关的字段，完整 schema 归外层应用所有。
/// email_token / recovery_token 是对应生命周期令牌的单次使用镜像：
/// 确认成功的同一次保存里必须清空镜像，重放同值令牌随即失效。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// 账号ID
    pub id: u64,
    /// 用户名
    pub username: String,
    /// 邮箱
    pub email: String,
    /// 全名
    pub full_name: String,
    /// 简介
    pub bio: String,
    /// 头像
    pub photo: Option<String>,
    /// 密码哈希（bcrypt），None 表示密码不可用
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// 是否活跃（注销后置 false，终态）
    pub is_active: bool,
    /// 是否系统账号
    pub is_system: bool,
    /// 密码找回令牌镜像
    pub recovery_token: Option<String>,
    /// 邮箱变更令牌镜像
    pub email_token: Option<String>,
    /// 待确认的新邮箱
    pub new_email: Option<String>,
    /// 注册时间
    pub date_joined: DateTime<Utc>,
}

impl Account {
    /// 创建新账号（活跃状态）
    pub fn new(id: u64, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            full_name: String::new(),
            bio: String::new(),
            photo: None,
            password_hash: None,
            is_active: true,
            is_system: false,
            recovery_token: None,
            email_token: None,
            new_email: None,
            date_joined: Utc::now(),
        }
    }

    /// 设置密码（bcrypt 哈希）
    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.password_hash = Some(hash_password(password)?);
        Ok(())
    }

    /// 使密码不可用（注销时调用，之后任何密码都无法匹配）
    pub fn set_unusable_password(&mut self) {
        self.password_hash = None;
    }

    /// 校验密码；密码不可用或哈希损坏一律视为不匹配
    pub fn check_password(&self, password: &str) -> bool {
        match &self.password_hash {
            Some(hash) => verify_password(password, hash).unwrap_or(false),
            None => false,
        }
    }

    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// 显示名：全名 → 用户名 → 邮箱
    pub fn display_name(&self) -> &str {
        if !self.full_name.is_empty() {
            &self.full_name
        } else if !self.username.is_empty() {
            &self.username
        } else {
            &self.email
        }
    }

    /// 邮箱为空时补默认邮箱 {username}@{domain}
    pub fn ensure_email(&mut self, default_domain: &str) {
        if self.email.is_empty() {
            self.email = format!("{}@{}", self.username, default_domain);
        }
    }

    /// 是否存在待确认的邮箱变更
    pub fn has_pending_email_change(&self) -> bool {
        self.email_token.is_some() && self.new_email.is_some()
    }
}
