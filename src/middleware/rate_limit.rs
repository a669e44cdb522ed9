//! 限流中间件
//!
//! 进程内固定窗口：每远端 IP 每 60 秒 60 个请求，超限 429。
//! 单实例部署，无需外部存储。

use crate::errors::AppError;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// 限流配置
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 窗口内的请求上限
    pub max_requests: u32,
    /// 窗口长度
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

struct WindowEntry {
    window_start: Instant,
    count: u32,
}

/// 每 IP 固定窗口计数表
pub struct RateLimitStore {
    config: RateLimitConfig,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl RateLimitStore {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 登记一次请求；返回是否放行
    pub fn check(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().expect("限流表锁中毒");
        let now = Instant::now();

        // 防止表无限增长：顺手清理过期窗口
        if entries.len() > 10_000 {
            let window = self.config.window;
            entries.retain(|_, e| now.duration_since(e.window_start) < window);
        }

        let entry = entries.entry(key.to_string()).or_insert(WindowEntry {
            window_start: now,
            count: 0,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= self.config.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// 限流中间件
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<RateLimitStore>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            store: Arc::new(RateLimitStore::new(config)),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimiterMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimiterMiddleware {
            service: Rc::new(service),
            store: self.store.clone(),
        })
    }
}

pub struct RateLimiterMiddleware<S> {
    service: Rc<S>,
    store: Arc<RateLimitStore>,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let store = self.store.clone();

        Box::pin(async move {
            let client_ip = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();

            if !store.check(&client_ip) {
                tracing::warn!(ip = %client_ip, "请求被限流");
                return Err(
                    AppError::RateLimited("请求过于频繁，请稍后重试".to_string()).into(),
                );
            }

            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_window_counting() {
        let store = RateLimitStore::new(RateLimitConfig {
            max_requests: 3,
            window: Duration::from_secs(60),
        });

        assert!(store.check("10.0.0.1"));
        assert!(store.check("10.0.0.1"));
        assert!(store.check("10.0.0.1"));
        assert!(!store.check("10.0.0.1"), "窗口内第 4 个请求应被拒绝");
        // 不同 IP 各自计数
        assert!(store.check("10.0.0.2"));
    }

    #[test]
    fn test_window_resets() {
        let store = RateLimitStore::new(RateLimitConfig {
            max_requests: 1,
            window: Duration::from_millis(0),
        });

        assert!(store.check("10.0.0.1"));
        // 零窗口立即重置
        assert!(store.check("10.0.0.1"));
    }
}
