//! SSE 推流模块

mod handler;
mod limiter;

pub use handler::{sse_handler, EventsQuery};
pub use limiter::{parse_rate, GlobalMetricsLimiter, PerUpsRateLimiter, GLOBAL_METRICS_LIMIT};
