//! HTTP 中间件模块

mod auth;
mod logging;
mod rate_limit;

pub use auth::BearerAuth;
pub use logging::{RequestId, RequestLogger};
pub use rate_limit::{RateLimitConfig, RateLimiter};
