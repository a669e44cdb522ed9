//! UPS 查询 API 处理器

use crate::errors::AppError;
use crate::repositories::UpsRepository;
use actix_web::{web, HttpResponse};

/// 查询全部 UPS 快照
///
/// 端点: GET /v1/ups
pub async fn list_ups(ups_repo: web::Data<UpsRepository>) -> Result<HttpResponse, AppError> {
    let rows = ups_repo.find_all().await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// 查询单个 UPS 快照
///
/// 端点: GET /v1/ups/{upsId}/status（upsId 先小写再查找）
pub async fn get_ups_status(
    path: web::Path<String>,
    ups_repo: web::Data<UpsRepository>,
) -> Result<HttpResponse, AppError> {
    let ups_id = path.into_inner().to_lowercase();

    match ups_repo.find_by_id(&ups_id).await? {
        Some(ups) => Ok(HttpResponse::Ok().json(ups)),
        None => Err(AppError::NotFound(format!("未知的 UPS: {}", ups_id))),
    }
}
