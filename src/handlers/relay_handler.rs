//! Relay 配对与推送调试 API 处理器

use crate::errors::AppError;
use crate::models::{DeviceEnvironment, PairResponse};
use crate::services::{DeviceService, RelayService};
use crate::utils::epoch_seconds_now;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;

/// 创建配对码
///
/// 端点: POST /v1/relay/pair
///
/// Relay 未配置时 503；Relay 侧失败映射为 502。
pub async fn create_pair(
    relay: web::Data<Option<Arc<RelayService>>>,
) -> Result<HttpResponse, AppError> {
    let relay = relay
        .as_ref()
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Relay 未配置".to_string()))?;

    let pair_code = crate::security::generate_pair_code()?;
    relay
        .create_pair_code(&pair_code, epoch_seconds_now())
        .await?;

    Ok(HttpResponse::Ok().json(PairResponse {
        api_version: "1.0",
        relay_url: relay.base_url(),
        pair_code,
        server_id: relay.server_id(),
    }))
}

/// 推送模拟请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatePushRequest {
    #[serde(default)]
    pub ups_id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
}

/// 触发一次模拟推送（仅非生产部署挂载）
///
/// 端点: POST /v1/status/simulate-push
///
/// 按目标 UPS 查出可见的设备注册（令牌解不开的行按未找到跳过），
/// 逐注册发一条 Relay 事件，带各自的 installationId。
pub async fn simulate_push(
    request: Option<web::Json<SimulatePushRequest>>,
    relay: web::Data<Option<Arc<RelayService>>>,
    device_service: web::Data<Arc<DeviceService>>,
) -> Result<HttpResponse, AppError> {
    let relay = relay
        .as_ref()
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Relay 未配置".to_string()))?
        .clone();

    let ups_id = request
        .as_ref()
        .and_then(|r| r.ups_id.clone())
        .unwrap_or_default()
        .to_lowercase();
    let event_type = request
        .as_ref()
        .and_then(|r| r.event_type.clone())
        .unwrap_or_else(|| "ups_status_change".to_string());

    let environment = relay.environment().to_string();
    let device_environment =
        DeviceEnvironment::parse(&environment).unwrap_or_default();
    let targets = device_service
        .push_targets(&ups_id, device_environment)
        .await?;
    let target_count = targets.len();

    // 与正常推送同路径：fire-and-forget
    tokio::spawn(async move {
        for target in targets {
            relay
                .send_event(
                    &event_type,
                    Some("on_battery"),
                    &ups_id,
                    &environment,
                    epoch_seconds_now(),
                    None,
                    target.installation_id,
                )
                .await;
        }
    });

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "targets": target_count
    })))
}
