//! SSE 限流器窗口行为测试

use std::time::Duration;
use volteec::sse::{parse_rate, GlobalMetricsLimiter, PerUpsRateLimiter, GLOBAL_METRICS_LIMIT};

#[test]
fn test_global_limiter_full_window() {
    let limiter = GlobalMetricsLimiter::new();

    for i in 0..GLOBAL_METRICS_LIMIT {
        assert!(limiter.allow(), "窗口内第 {} 帧应放行", i + 1);
    }
    assert!(!limiter.allow(), "超出 50 帧应拦截");
    assert!(!limiter.allow());
}

#[test]
fn test_global_limiter_window_resets() {
    let limiter = GlobalMetricsLimiter::with_limit(2);

    assert!(limiter.allow());
    assert!(limiter.allow());
    assert!(!limiter.allow());

    // 窗口满 1 秒后整体重置
    std::thread::sleep(Duration::from_millis(1050));
    assert!(limiter.allow(), "新窗口应重新放行");
}

#[test]
fn test_per_ups_frame_count_bounded_by_interval() {
    // rate = 100ms，观测 ~350ms：单 UPS 放行数不超过 ⌈window/rate⌉ = 4
    let mut limiter = PerUpsRateLimiter::new(Duration::from_millis(100));
    let start = std::time::Instant::now();
    let mut emitted = 0;

    while start.elapsed() < Duration::from_millis(350) {
        if limiter.check("ups1") {
            limiter.record("ups1");
            emitted += 1;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    assert!(
        emitted <= 4,
        "350ms 窗口内 100ms 间隔最多放行 4 帧，实际 {}",
        emitted
    );
    assert!(emitted >= 3, "间隔到期后应继续放行，实际 {}", emitted);
}

#[test]
fn test_per_ups_isolation() {
    let mut limiter = PerUpsRateLimiter::new(Duration::from_secs(3));

    limiter.record("ups1");
    assert!(!limiter.check("ups1"));
    // 另一台 UPS 不受影响
    assert!(limiter.check("ups2"));
    limiter.record("ups2");
    assert!(!limiter.check("ups2"));
}

#[test]
fn test_rate_parsing_contract() {
    assert_eq!(parse_rate(Some("1s")), Duration::from_secs(1));
    assert_eq!(parse_rate(Some("3s")), Duration::from_secs(3));
    assert_eq!(parse_rate(Some("5s")), Duration::from_secs(5));
    // 非法值与缺失一律回落默认 3 秒
    assert_eq!(parse_rate(Some("2s")), Duration::from_secs(3));
    assert_eq!(parse_rate(Some("fast")), Duration::from_secs(3));
    assert_eq!(parse_rate(None), Duration::from_secs(3));
}
