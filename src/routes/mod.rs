//! 路由配置模块

use crate::handlers;
use crate::middleware::{BearerAuth, RateLimiter};
use crate::sse;
use actix_web::web;

/// 配置所有路由
///
/// `auth` 为 None 时进入降级模式：只挂载公开路由，/v1/* 整体不注册。
/// 生产部署不挂载 simulate-push 调试端点。
pub fn configure(
    cfg: &mut web::ServiceConfig,
    auth: Option<BearerAuth>,
    rate_limiter: RateLimiter,
    production: bool,
) {
    // 公开路由
    cfg.route("/health", web::get().to(handlers::health))
        .route("/ready", web::get().to(handlers::ready))
        .route("/metrics", web::get().to(handlers::metrics));

    let auth = match auth {
        Some(auth) => auth,
        None => return,
    };

    let mut scope = web::scope("/v1")
        // 认证之前先过限流（wrap 逆序生效）
        .wrap(auth)
        .wrap(rate_limiter)
        .route("/ups", web::get().to(handlers::list_ups))
        .route("/ups/{ups_id}/status", web::get().to(handlers::get_ups_status))
        .route("/register-device", web::post().to(handlers::register_device))
        .route(
            "/unregister-device",
            web::post().to(handlers::unregister_device),
        )
        .route("/relay/pair", web::post().to(handlers::create_pair))
        .route("/events", web::get().to(sse::sse_handler))
        .route("/status", web::get().to(handlers::server_status));

    if !production {
        scope = scope.route(
            "/status/simulate-push",
            web::post().to(handlers::simulate_push),
        );
    }

    cfg.service(scope);
}
