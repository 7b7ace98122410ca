//! 计数存储接口与进程内实现
//!
//! 限流历史以毫秒时间戳序列（新的在前）持久化，key 自带 TTL，
//! 过期 key 由存储自行清理。多进程部署时应使用 Redis 实现。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::infra::clock::Clock;

/// 计数存储接口
///
/// 只要求 get / set-with-ttl 语义，具体过期精度由实现决定。
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// 读取某个 key 的历史，不存在或已过期返回 None
    async fn get(&self, key: &str) -> Result<Option<Vec<i64>>>;

    /// 写入历史并设置 TTL
    async fn set(&self, key: &str, history: Vec<i64>, ttl: Duration) -> Result<()>;
}

/// 进程内计数存储（DashMap 实现）
///
/// 过期采用读时惰性清理，TTL 判断依赖注入的时钟。
pub struct MemoryCounterStore {
    entries: DashMap<String, StoredHistory>,
    clock: Arc<dyn Clock>,
}

struct StoredHistory {
    history: Vec<i64>,
    /// 过期时刻（毫秒时间戳）
    expires_at: i64,
}

impl MemoryCounterStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// 当前存活的 key 数量（测试用）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<i64>>> {
        let now = self.clock.now_millis();

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.history.clone()));
            }
        } else {
            return Ok(None);
        }

        // 已过期，顺手移除
        self.entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, history: Vec<i64>, ttl: Duration) -> Result<()> {
        let expires_at = self.clock.now_millis() + ttl.as_millis() as i64;
        self.entries.insert(
            key.to_string(),
            StoredHistory {
                history,
                expires_at,
            },
        );
        Ok(())
    }
}
