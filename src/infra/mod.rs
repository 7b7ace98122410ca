//! 基础设施层：时钟、计数存储、命名锁

pub mod clock;
pub mod counter_store;
pub mod named_lock;
pub mod redis_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter_store::{CounterStore, MemoryCounterStore};
pub use named_lock::NamedLocks;
pub use redis_store::RedisCounterStore;
