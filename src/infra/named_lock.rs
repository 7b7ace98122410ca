use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 命名互斥锁注册表
///
/// 账号注销时按固定锁名串行化匿名用户名生成，
/// 避免并发注销在用户名唯一性解析上互相竞争。
/// 单进程内等价于 advisory lock；多进程部署可换分布式锁，契约不变。
#[derive(Default)]
pub struct NamedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NamedLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// 获取命名锁，guard 释放即解锁
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
