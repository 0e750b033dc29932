//! 时钟抽象 - 让超时判断和免打扰时段可测试

use chrono::{DateTime, Local, TimeZone, Timelike, Utc};
use std::sync::atomic::{AtomicI64, AtomicU16, Ordering};
use std::sync::Arc;

/// 时间来源
pub trait Clock: Send + Sync {
    /// Unix 毫秒时间戳
    fn now_ms(&self) -> i64;

    /// 本地时间的当日分钟数（0..1440）
    fn minute_of_day(&self) -> u16;

    /// `now_ms` 对应的 UTC 时间
    fn now_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_ms())
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn minute_of_day(&self) -> u16 {
        let now = Local::now();
        (now.hour() * 60 + now.minute()) as u16
    }
}

/// 手动时钟（测试用），克隆后共享同一时间
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
    minute_of_day: Arc<AtomicU16>,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        let clock = Self::default();
        clock.set_ms(now_ms);
        clock
    }

    pub fn set_ms(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta: i64) {
        self.now_ms.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set_time_of_day(&self, hour: u16, minute: u16) {
        self.minute_of_day.store(hour * 60 + minute, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn minute_of_day(&self) -> u16 {
        self.minute_of_day.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();

        other.advance_ms(500);
        other.set_time_of_day(23, 30);

        assert_eq!(clock.now_ms(), 1_500);
        assert_eq!(clock.minute_of_day(), 23 * 60 + 30);
    }

    #[test]
    fn test_now_utc_follows_manual_time() {
        let clock = ManualClock::new(86_400_000);
        assert_eq!(clock.now_utc().timestamp_millis(), 86_400_000);
    }

    #[test]
    fn test_system_clock_minute_in_range() {
        assert!(SystemClock.minute_of_day() < 24 * 60);
    }
}
