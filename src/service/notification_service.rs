//! 通知接口：生命周期事件触达用户
//!
//! 邮件内容组装与投递由外层实现；核心只按模板名 + 上下文下发。
//! 发送是 fire-and-forget：失败记日志，绝不阻塞生命周期转换的成功返回。

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::error::Result;

/// 通知发送接口
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 按模板向收件人发送通知
    async fn send(&self, template: &str, recipient: &str, context: Value) -> Result<()>;
}

/// 仅记日志的通知实现（默认/测试用）
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, template: &str, recipient: &str, _context: Value) -> Result<()> {
        info!(template, recipient, "notification dispatched");
        Ok(())
    }
}
