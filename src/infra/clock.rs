use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// 时钟接口
///
/// 限流窗口和令牌年龄判断都依赖当前时间，注入时钟后测试不需要 sleep。
pub trait Clock: Send + Sync {
    /// 当前时间（UTC）
    fn now(&self) -> DateTime<Utc>;

    /// 当前毫秒时间戳
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// 系统时钟
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动时钟（测试用，可设置和推进）
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// 以指定起始时间创建
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// 以当前系统时间创建
    pub fn from_system() -> Self {
        Self::new(Utc::now())
    }

    /// 设置当前时间
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// 向前推进
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.write();
        *now = *now + delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::from_system();
        let before = clock.now();

        clock.advance(Duration::seconds(61));

        assert_eq!(clock.now() - before, Duration::seconds(61));
    }

    #[test]
    fn test_manual_clock_is_frozen() {
        let clock = ManualClock::from_system();
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert_eq!(a, b);
    }
}
