//! 健康检查与指标 API 处理器

use crate::db::PostgresPool;
use crate::metrics::Metrics;
use actix_web::{web, HttpResponse};
use std::sync::Arc;

/// 降级模式标记（API_TOKEN 缺失时为 true）
#[derive(Debug, Clone, Copy)]
pub struct DegradedMode(pub bool);

/// 存活检查（负载均衡器）
///
/// 端点: GET /health
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("ok")
}

/// 就绪检查
///
/// 端点: GET /ready
///
/// 降级模式或数据库不可达时返回 503。
pub async fn ready(
    pg_pool: web::Data<Arc<PostgresPool>>,
    degraded: web::Data<DegradedMode>,
) -> HttpResponse {
    if degraded.0 {
        return HttpResponse::ServiceUnavailable()
            .content_type("text/plain")
            .body("not_ready");
    }

    match pg_pool.health_check().await {
        Ok(_) => HttpResponse::Ok().content_type("text/plain").body("ready"),
        Err(_) => HttpResponse::ServiceUnavailable()
            .content_type("text/plain")
            .body("not_ready"),
    }
}

/// Prometheus 指标
///
/// 端点: GET /metrics
pub async fn metrics(metrics: web::Data<Arc<Metrics>>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics.render_prometheus())
}
