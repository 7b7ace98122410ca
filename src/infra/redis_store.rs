// RedisCounterStore - Redis 计数存储实现
// 基于 bb8-redis 连接池

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;

use crate::config::RedisConfig;
use crate::error::{GateError, Result};
use crate::infra::counter_store::CounterStore;

/// Redis 计数存储（基于连接池）
///
/// 历史序列以 JSON 编码写入 string，SETEX 携带窗口 TTL，
/// 过期 key 由 Redis 自行淘汰，多进程共享同一份配额。
pub struct RedisCounterStore {
    pool: Arc<Pool<RedisConnectionManager>>,
    /// 单条 Redis 命令的执行超时
    command_timeout: Duration,
}

impl RedisCounterStore {
    /// 创建新的 Redis 计数存储（从 RedisConfig 配置）
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let manager = RedisConnectionManager::new(config.url.clone())
            .map_err(|e| GateError::Internal(format!("Failed to create Redis manager: {}", e)))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout())
            .build(manager)
            .await
            .map_err(|e| GateError::Internal(format!("Failed to create Redis pool: {}", e)))?;

        let command_timeout = config.command_timeout();

        // 测试连接
        {
            let mut conn = pool.get().await.map_err(|e| {
                GateError::StoreUnavailable(format!("Failed to get Redis connection: {}", e))
            })?;

            let _: String = conn
                .ping()
                .await
                .map_err(|e| GateError::StoreUnavailable(format!("Redis ping failed: {}", e)))?;
        }

        tracing::info!(
            "Redis 计数存储已就绪 (pool_size={}, conn_timeout={}s, cmd_timeout={}ms)",
            config.pool_size,
            config.connection_timeout_secs,
            config.command_timeout_ms,
        );

        Ok(Self {
            pool: Arc::new(pool),
            command_timeout,
        })
    }

    /// 从连接池获取连接
    async fn get_conn(&self) -> Result<bb8::PooledConnection<'_, RedisConnectionManager>> {
        self.pool.get().await.map_err(|e| {
            GateError::StoreUnavailable(format!("Failed to get Redis connection: {}", e))
        })
    }

    /// 执行带超时的 Redis 操作
    async fn with_timeout<F, T>(&self, op: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.command_timeout, op)
            .await
            .map_err(|_| {
                GateError::StoreUnavailable(format!(
                    "Redis command timeout ({}ms)",
                    self.command_timeout.as_millis()
                ))
            })?
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<i64>>> {
        self.with_timeout(async {
            let mut conn = self.get_conn().await?;
            let raw: Option<String> = conn
                .get(key)
                .await
                .map_err(|e| GateError::StoreUnavailable(format!("Redis GET failed: {}", e)))?;

            match raw {
                Some(json) => {
                    let history: Vec<i64> = serde_json::from_str(&json).map_err(|e| {
                        GateError::Internal(format!("Corrupt throttle history at {}: {}", key, e))
                    })?;
                    Ok(Some(history))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn set(&self, key: &str, history: Vec<i64>, ttl: Duration) -> Result<()> {
        self.with_timeout(async {
            let mut conn = self.get_conn().await?;
            let json = serde_json::to_string(&history)
                .map_err(|e| GateError::Internal(format!("Serialize history failed: {}", e)))?;

            let seconds = ttl.as_secs().max(1);
            conn.set_ex::<_, _, ()>(key, json, seconds)
                .await
                .map_err(|e| GateError::StoreUnavailable(format!("Redis SETEX failed: {}", e)))?;
            Ok(())
        })
        .await
    }
}
