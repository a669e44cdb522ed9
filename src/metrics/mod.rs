//! 进程内运行指标
//!
//! 原子计数器集合，经 `GET /metrics` 以 Prometheus 文本格式导出。

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

/// 进程启动时间
static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// 指标快照
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub poll_cycles: u64,
    pub poll_success: u64,
    pub poll_failure: u64,
    pub events_published: u64,
    pub sse_connections: i64,
    pub sse_clients_dropped: u64,
    pub sse_frames_sent: u64,
    pub sse_frames_rate_limited: u64,
    pub relay_send_success: u64,
    pub relay_send_failure: u64,
}

/// 运行指标集合
pub struct Metrics {
    poll_cycles: AtomicU64,
    poll_success: AtomicU64,
    poll_failure: AtomicU64,
    events_published: AtomicU64,
    sse_connections: AtomicI64,
    sse_clients_dropped: AtomicU64,
    sse_frames_sent: AtomicU64,
    sse_frames_rate_limited: AtomicU64,
    relay_send_success: AtomicU64,
    relay_send_failure: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            poll_cycles: AtomicU64::new(0),
            poll_success: AtomicU64::new(0),
            poll_failure: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            sse_connections: AtomicI64::new(0),
            sse_clients_dropped: AtomicU64::new(0),
            sse_frames_sent: AtomicU64::new(0),
            sse_frames_rate_limited: AtomicU64::new(0),
            relay_send_success: AtomicU64::new(0),
            relay_send_failure: AtomicU64::new(0),
        }
    }

    pub fn incr_poll_cycles(&self) {
        self.poll_cycles.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_poll_success(&self) {
        self.poll_success.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_poll_failure(&self) {
        self.poll_failure.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_events_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }
    pub fn sse_connected(&self) {
        self.sse_connections.fetch_add(1, Ordering::Relaxed);
    }
    pub fn sse_disconnected(&self) {
        self.sse_connections.fetch_sub(1, Ordering::Relaxed);
    }
    pub fn incr_sse_clients_dropped(&self) {
        self.sse_clients_dropped.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_sse_frames_sent(&self) {
        self.sse_frames_sent.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_sse_frames_rate_limited(&self) {
        self.sse_frames_rate_limited.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_relay_send_success(&self) {
        self.relay_send_success.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_relay_send_failure(&self) {
        self.relay_send_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
            poll_success: self.poll_success.load(Ordering::Relaxed),
            poll_failure: self.poll_failure.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            sse_connections: self.sse_connections.load(Ordering::Relaxed),
            sse_clients_dropped: self.sse_clients_dropped.load(Ordering::Relaxed),
            sse_frames_sent: self.sse_frames_sent.load(Ordering::Relaxed),
            sse_frames_rate_limited: self.sse_frames_rate_limited.load(Ordering::Relaxed),
            relay_send_success: self.relay_send_success.load(Ordering::Relaxed),
            relay_send_failure: self.relay_send_failure.load(Ordering::Relaxed),
        }
    }

    /// 渲染 Prometheus 文本
    pub fn render_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::with_capacity(1024);

        let counters: [(&str, u64); 9] = [
            ("volteec_poll_cycles_total", s.poll_cycles),
            ("volteec_poll_success_total", s.poll_success),
            ("volteec_poll_failure_total", s.poll_failure),
            ("volteec_events_published_total", s.events_published),
            ("volteec_sse_clients_dropped_total", s.sse_clients_dropped),
            ("volteec_sse_frames_sent_total", s.sse_frames_sent),
            (
                "volteec_sse_frames_rate_limited_total",
                s.sse_frames_rate_limited,
            ),
            ("volteec_relay_send_success_total", s.relay_send_success),
            ("volteec_relay_send_failure_total", s.relay_send_failure),
        ];
        for (name, value) in counters {
            out.push_str(&format!("# TYPE {} counter\n{} {}\n", name, name, value));
        }
        out.push_str(&format!(
            "# TYPE volteec_sse_connections gauge\nvolteec_sse_connections {}\n",
            s.sse_connections
        ));
        out.push_str(&format!(
            "# TYPE volteec_uptime_seconds gauge\nvolteec_uptime_seconds {}\n",
            START_TIME.elapsed().as_secs()
        ));

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.incr_poll_cycles();
        metrics.incr_poll_cycles();
        metrics.incr_poll_failure();
        metrics.sse_connected();

        let s = metrics.snapshot();
        assert_eq!(s.poll_cycles, 2);
        assert_eq!(s.poll_failure, 1);
        assert_eq!(s.sse_connections, 1);
    }

    #[test]
    fn test_prometheus_rendering() {
        let metrics = Metrics::new();
        metrics.incr_relay_send_success();

        let text = metrics.render_prometheus();
        assert!(text.contains("# TYPE volteec_relay_send_success_total counter"));
        assert!(text.contains("volteec_relay_send_success_total 1"));
        assert!(text.contains("volteec_sse_connections 0"));
    }
}
