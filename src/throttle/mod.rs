//! 限流引擎：作用域策略、滑动窗口限流器、操作解析器

pub mod limiter;
pub mod resolver;
pub mod scope;

pub use limiter::{RateLimiter, ThrottleDecision};
pub use resolver::{ActionScopeResolver, ScopeBinding};
pub use scope::{
    AttemptOutcome, IdentityKind, RatePolicy, RecordPolicy, ThrottleActor, ThrottleIdentity,
    ThrottleScope,
};
