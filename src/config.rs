use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 核心配置
///
/// 启动时构造一次，之后以不可变引用传给各组件，运行期不做全局修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// 是否开放公共注册
    pub public_register_enabled: bool,
    /// 限流配置
    pub throttle: ThrottleConfig,
    /// 令牌配置
    pub token: TokenConfig,
    /// 邮箱规则
    pub email: EmailConfig,
    /// Redis 配置（未配置时使用进程内计数存储）
    pub redis: Option<RedisConfig>,
    /// 日志级别
    pub log_level: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            public_register_enabled: true,
            throttle: ThrottleConfig::default(),
            token: TokenConfig::default(),
            email: EmailConfig::default(),
            redis: None,
            log_level: "info".to_string(),
        }
    }
}

/// 各作用域的速率配置
///
/// 速率串形如 "1/min"、"100/day"；null/缺省表示该作用域关闭。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// 登录失败（全局，仅失败记录）
    pub login_fail: Option<String>,
    /// 注册成功（全局，仅成功记录）
    pub register_success: Option<String>,
    /// 资料读取（全局，无条件记录）
    pub user_detail: Option<String>,
    /// 资料更新（按操作者，无条件记录）
    pub user_update: Option<String>,
    /// 豁免限流的身份（用户 ID 或来源地址）
    pub whitelist: Vec<String>,
    /// 计数存储不可用时是否放行
    ///
    /// 默认 true：宁可放过配额也不把登录/注册整体锁死，
    /// 这是偏向可用性的既定取舍；设为 false 则按 StoreUnavailable 拒绝。
    pub fail_open: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            login_fail: None,
            register_success: None,
            user_detail: None,
            user_update: None,
            whitelist: Vec::new(),
            fail_open: true,
        }
    }
}

/// 令牌配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HS256 签名密钥（进程级，启动时加载一次）
    pub signing_secret: String,
    /// 注销令牌最大年龄（秒），默认 30 天
    pub max_age_cancel_account: i64,
    /// 通用令牌最大年龄（秒），None = 不限
    pub max_age_auth_token: Option<i64>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            max_age_cancel_account: 2_592_000,
            max_age_auth_token: None,
        }
    }
}

impl TokenConfig {
    /// 注销令牌的年龄上限
    pub fn cancel_account_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_age_cancel_account)
    }
}

/// 邮箱规则
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// 允许的邮箱域名；空列表 = 不限制
    pub allowed_domains: Vec<String>,
    /// 匿名化/补全邮箱时使用的默认域名
    pub default_domain: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            allowed_domains: Vec::new(),
            default_domain: "accountgate.local".to_string(),
        }
    }
}

/// Redis 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// 连接地址
    pub url: String,
    /// 连接池大小
    pub pool_size: u32,
    /// 获取连接超时（秒）
    pub connection_timeout_secs: u64,
    /// 单条命令超时（毫秒）
    pub command_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 10,
            connection_timeout_secs: 5,
            command_timeout_ms: 500,
        }
    }
}

impl RedisConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl GateConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let mut config: GateConfig = toml::from_str(&content)
            .with_context(|| format!("配置文件解析失败: {}", path.display()))?;

        config.apply_env();
        info!("配置已加载: {}", path.display());
        Ok(config)
    }

    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// 环境变量覆盖（密钥等敏感项不落配置文件）
    fn apply_env(&mut self) {
        if let Ok(secret) = env::var("ACCOUNTGATE_SIGNING_SECRET") {
            self.token.signing_secret = secret;
        }
        if let Ok(url) = env::var("ACCOUNTGATE_REDIS_URL") {
            let mut redis = self.redis.clone().unwrap_or_default();
            redis.url = url;
            self.redis = Some(redis);
        }
    }
}
