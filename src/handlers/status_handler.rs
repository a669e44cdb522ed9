//! 服务器状态 API 处理器

use crate::models::ServerStatusResponse;
use crate::services::{UpdateCheckerService, PROTOCOL_VERSION};
use actix_web::{web, HttpResponse};
use std::sync::Arc;

/// 服务器版本与兼容性状态
///
/// 端点: GET /v1/status
pub async fn server_status(
    update_checker: web::Data<Arc<UpdateCheckerService>>,
) -> HttpResponse {
    HttpResponse::Ok().json(ServerStatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        compatibility: update_checker.compatibility().as_str().to_string(),
    })
}
