//! 设备注册 API 处理器

use crate::errors::AppError;
use crate::models::{DeviceMutationResponse, RegisterDeviceRequest, UnregisterDeviceRequest};
use crate::services::DeviceService;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;

/// 注册设备令牌（幂等）
///
/// 端点: POST /v1/register-device
///
/// 新建返回 201，覆盖已有行返回 200。
pub async fn register_device(
    request: web::Json<RegisterDeviceRequest>,
    device_service: web::Data<Arc<DeviceService>>,
) -> Result<HttpResponse, AppError> {
    request
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let (_, created) = device_service.register(&request).await?;

    let body = DeviceMutationResponse {
        success: true,
        created,
    };
    if created {
        Ok(HttpResponse::Created().json(body))
    } else {
        Ok(HttpResponse::Ok().json(body))
    }
}

/// 注销设备令牌（幂等，目标不存在同样 200）
///
/// 端点: POST /v1/unregister-device
pub async fn unregister_device(
    request: web::Json<UnregisterDeviceRequest>,
    device_service: web::Data<Arc<DeviceService>>,
) -> Result<HttpResponse, AppError> {
    request
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    device_service.unregister(&request).await?;

    Ok(HttpResponse::Ok().json(DeviceMutationResponse {
        success: true,
        created: false,
    }))
}
