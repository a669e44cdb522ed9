//! 统一错误类型定义

use crate::nut::NutError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

/// 应用错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // 认证错误 (401)
    #[error("认证失败")]
    Unauthorized(String),

    // 资源不存在 (404)
    #[error("资源不存在")]
    NotFound(String),

    // 请求验证错误 (400)
    #[error("请求参数无效")]
    ValidationError(String),

    // 限流错误 (429)
    #[error("请求过于频繁")]
    RateLimited(String),

    // 上游 Relay 错误 (502)
    #[error("Relay 调用失败")]
    RelayError(String),

    // 依赖服务未配置 (503)
    #[error("服务不可用")]
    ServiceUnavailable(String),

    // NUT 协议错误（仅在轮询器内部流转，不出现在 HTTP 面）
    #[error("NUT 协议错误")]
    Nut(#[from] NutError),

    // 数据库错误 (500)
    #[error("数据库错误")]
    DatabaseError(#[from] sqlx::Error),

    // 内部错误 (500)
    #[error("内部服务错误")]
    InternalError(String),

    // 配置错误
    #[error("配置错误")]
    ConfigError(String),
}

/// API 错误响应结构
///
/// 固定为 `{"error": true, "reason": "..."}`；请求 ID 经响应头关联。
#[derive(Serialize)]
struct ErrorResponse {
    error: bool,
    reason: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::RelayError(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Nut(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // 4xx 把具体原因回传客户端；5xx 不暴露内部细节
        let reason = match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::RateLimited(msg) => msg.clone(),
            AppError::RelayError(_) => "Relay 请求失败".to_string(),
            AppError::ServiceUnavailable(msg) => msg.clone(),
            AppError::Nut(_)
            | AppError::DatabaseError(_)
            | AppError::InternalError(_)
            | AppError::ConfigError(_) => "服务内部错误".to_string(),
        };

        if status.is_server_error() {
            tracing::error!(
                error_type = %self,
                status = %status,
                error_detail = ?self,
                "请求处理错误"
            );
        } else {
            tracing::warn!(
                error_type = %self,
                status = %status,
                "请求被拒绝"
            );
        }

        HttpResponse::build(status).json(ErrorResponse { error: true, reason })
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}
