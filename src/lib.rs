//! accountgate - 账号安全核心
//!
//! 两个紧耦合的子系统：按作用域的限流引擎（登录失败、注册成功、
//! 资料读写各有独立配额），以及驱动账号生命周期转换的签名令牌服务
//! （密码找回、邮箱变更确认、账号注销），共享同一套
//! 「有界窗口、有界寿命」的正确性模型。

pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod infra;
pub mod logging;
pub mod model;
pub mod repository;
pub mod service;
pub mod slug;
pub mod throttle;

pub use config::GateConfig;
pub use error::{ErrorCode, GateError, Result};
pub use gate::AccountGate;
pub use model::Account;
pub use throttle::{ThrottleActor, ThrottleDecision, ThrottleIdentity};
