//! SSE 指标帧限流器
//!
//! 两级限流只作用于 metrics_update 帧：
//! - 连接级：同一 ups_id 两次发送至少间隔订阅方选择的 rate；
//! - 全局级：全进程每个滚动重置的 1 秒窗口至多 50 帧。
//! status_change 与心跳帧不经过限流。

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 全局窗口内的指标帧上限
pub const GLOBAL_METRICS_LIMIT: u32 = 50;

/// 全局窗口长度
const GLOBAL_WINDOW: Duration = Duration::from_secs(1);

/// 连接级每 UPS 限流器（由连接任务独占，无需加锁）
pub struct PerUpsRateLimiter {
    interval: Duration,
    last_emission: HashMap<String, Instant>,
}

impl PerUpsRateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emission: HashMap::new(),
        }
    }

    /// 该 UPS 距上次发送是否已满一个间隔（不记录）
    pub fn check(&self, ups_id: &str) -> bool {
        self.last_emission
            .get(ups_id)
            .map(|last| last.elapsed() >= self.interval)
            .unwrap_or(true)
    }

    /// 记录一次实际发送
    pub fn record(&mut self, ups_id: &str) {
        self.last_emission.insert(ups_id.to_string(), Instant::now());
    }
}

/// 全局指标帧限流器（跨连接共享，滚动重置窗口）
pub struct GlobalMetricsLimiter {
    state: Mutex<WindowState>,
    limit: u32,
}

struct WindowState {
    window_start: Instant,
    count: u32,
}

impl GlobalMetricsLimiter {
    pub fn new() -> Self {
        Self::with_limit(GLOBAL_METRICS_LIMIT)
    }

    pub fn with_limit(limit: u32) -> Self {
        Self {
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                count: 0,
            }),
            limit,
        }
    }

    /// 申请发送一帧；窗口满 1 秒即整体重置
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().expect("全局限流器锁中毒");

        if state.window_start.elapsed() >= GLOBAL_WINDOW {
            state.window_start = Instant::now();
            state.count = 0;
        }

        if state.count >= self.limit {
            return false;
        }
        state.count += 1;
        true
    }
}

impl Default for GlobalMetricsLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析 `?rate=` 参数：1s/3s/5s，其余取默认 3 秒
pub fn parse_rate(rate: Option<&str>) -> Duration {
    match rate {
        Some("1s") => Duration::from_secs(1),
        Some("3s") => Duration::from_secs(3),
        Some("5s") => Duration::from_secs(5),
        _ => Duration::from_secs(3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate(Some("1s")), Duration::from_secs(1));
        assert_eq!(parse_rate(Some("3s")), Duration::from_secs(3));
        assert_eq!(parse_rate(Some("5s")), Duration::from_secs(5));
        assert_eq!(parse_rate(Some("10s")), Duration::from_secs(3));
        assert_eq!(parse_rate(Some("")), Duration::from_secs(3));
        assert_eq!(parse_rate(None), Duration::from_secs(3));
    }

    #[test]
    fn test_per_ups_limiter_spacing() {
        let mut limiter = PerUpsRateLimiter::new(Duration::from_secs(3));

        assert!(limiter.check("ups1"), "首帧应放行");
        limiter.record("ups1");
        assert!(!limiter.check("ups1"), "间隔内应拦截");
        // 其他 UPS 互不影响
        assert!(limiter.check("ups2"));
    }

    #[test]
    fn test_per_ups_limiter_zero_interval() {
        let mut limiter = PerUpsRateLimiter::new(Duration::from_secs(0));
        limiter.record("ups1");
        assert!(limiter.check("ups1"));
    }

    #[test]
    fn test_global_limiter_caps_window() {
        let limiter = GlobalMetricsLimiter::with_limit(3);

        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow(), "窗口内第 4 帧应被拦截");
    }
}
