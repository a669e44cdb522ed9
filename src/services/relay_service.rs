//! Relay 推送客户端
//!
//! 所有请求带 HMAC-SHA256 签名：
//! `X-Volteec-Signature = hex(HMAC(secret, "<timestamp>\n<nonce>\n<rawBody>"))`，
//! rawBody 与实际发送的字节完全一致（同一份 `Vec<u8>` 先签名后发送）。
//! 轮询器视角全部 fire-and-forget；只有配对码创建把失败上抛给调用方。

use crate::config::RelaySettings;
use crate::errors::AppError;
use crate::metrics::Metrics;
use crate::repositories::DeviceRepository;
use ring::hmac;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// 单次请求超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// 建连超时
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// 事件推送的重试间隔
const EVENT_RETRY_DELAY: Duration = Duration::from_secs(2);
/// 事件推送的总尝试次数
const EVENT_ATTEMPTS: u32 = 2;

/// 计算 Relay 请求签名
pub fn sign_relay_request(secret: &str, timestamp: &str, nonce: &str, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut message = Vec::with_capacity(timestamp.len() + nonce.len() + body.len() + 2);
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(nonce.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(body);
    hex::encode(hmac::sign(&key, &message).as_ref())
}

/// `/event` 请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayEventBody {
    tenant_id: Uuid,
    event_id: Uuid,
    event_type: String,
    timestamp: i64,
    environment: String,
    ups_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    server_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    battery_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    installation_id: Option<Uuid>,
}

/// `/heartbeat` 请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayHeartbeatBody {
    tenant_id: Uuid,
    server_id: Uuid,
    timestamp: i64,
}

/// `/pair` 请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayPairBody {
    tenant_id: Uuid,
    server_id: Uuid,
    pair_code: String,
    timestamp: i64,
}

/// Relay 推送客户端
pub struct RelayService {
    client: reqwest::Client,
    settings: RelaySettings,
    secret: SecretString,
    metrics: Arc<Metrics>,
}

impl RelayService {
    pub fn new(
        settings: RelaySettings,
        secret: SecretString,
        metrics: Arc<Metrics>,
    ) -> Result<Self, AppError> {
        if secret.expose_secret().is_empty() {
            return Err(AppError::ConfigError(
                "RELAY_TENANT_SECRET 不能为空".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP 客户端创建失败: {}", e)))?;

        Ok(Self {
            client,
            settings,
            secret,
            metrics,
        })
    }

    /// 推送事件携带的环境标记
    pub fn environment(&self) -> &str {
        &self.settings.environment
    }

    /// 服务器 ID
    pub fn server_id(&self) -> Uuid {
        self.settings.server_id
    }

    /// Relay 基地址（配对响应回传给客户端）
    pub fn base_url(&self) -> String {
        self.settings.base_url.to_string()
    }

    /// 推送状态事件（2 次尝试，2 秒间隔，任何 2xx 即止）
    ///
    /// 失败只记日志，不向调用方传播。
    #[allow(clippy::too_many_arguments)]
    pub async fn send_event(
        &self,
        event_type: &str,
        status: Option<&str>,
        ups_id: &str,
        environment: &str,
        timestamp_seconds: i64,
        battery_level: Option<i32>,
        installation_id: Option<Uuid>,
    ) {
        let body = RelayEventBody {
            tenant_id: self.settings.tenant_id,
            event_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            timestamp: timestamp_seconds,
            environment: environment.to_string(),
            ups_id: ups_id.to_string(),
            status: status.map(|s| s.to_string()),
            server_id: self.settings.server_id,
            battery_level,
            installation_id,
        };

        let raw_body = match serde_json::to_vec(&body) {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, "Relay 事件序列化失败");
                return;
            }
        };

        for attempt in 1..=EVENT_ATTEMPTS {
            match self
                .post_signed("/event", raw_body.clone(), timestamp_seconds)
                .await
            {
                Ok(status_code) if status_code.is_success() => {
                    debug!(
                        event_type = event_type,
                        ups_id = ups_id,
                        attempt = attempt,
                        "Relay 事件已送达"
                    );
                    self.metrics.incr_relay_send_success();
                    return;
                }
                Ok(status_code) => {
                    warn!(
                        event_type = event_type,
                        ups_id = ups_id,
                        attempt = attempt,
                        status = %status_code,
                        "Relay 返回非 2xx"
                    );
                }
                Err(e) => {
                    warn!(
                        event_type = event_type,
                        ups_id = ups_id,
                        attempt = attempt,
                        error = %e,
                        "Relay 事件发送失败"
                    );
                }
            }
            if attempt < EVENT_ATTEMPTS {
                tokio::time::sleep(EVENT_RETRY_DELAY).await;
            }
        }

        self.metrics.incr_relay_send_failure();
        error!(event_type = event_type, ups_id = ups_id, "Relay 事件在重试后仍失败，丢弃");
    }

    /// 发送服务器心跳（不重试，失败只记日志）
    pub async fn send_heartbeat(&self, timestamp_seconds: i64) {
        let body = RelayHeartbeatBody {
            tenant_id: self.settings.tenant_id,
            server_id: self.settings.server_id,
            timestamp: timestamp_seconds,
        };
        let raw_body = match serde_json::to_vec(&body) {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, "Relay 心跳序列化失败");
                return;
            }
        };

        match self
            .post_signed("/heartbeat", raw_body, timestamp_seconds)
            .await
        {
            Ok(status) if status.is_success() => {
                debug!("Relay 心跳已送达");
            }
            Ok(status) => {
                warn!(status = %status, "Relay 心跳返回非 2xx");
            }
            Err(e) => {
                warn!(error = %e, "Relay 心跳发送失败");
            }
        }
    }

    /// 创建配对码
    ///
    /// 与其余调用不同：非 2xx 或网络错误会上抛（HTTP 层映射为 502）。
    pub async fn create_pair_code(
        &self,
        pair_code: &str,
        timestamp_seconds: i64,
    ) -> Result<(), AppError> {
        let body = RelayPairBody {
            tenant_id: self.settings.tenant_id,
            server_id: self.settings.server_id,
            pair_code: pair_code.to_string(),
            timestamp: timestamp_seconds,
        };
        let raw_body = serde_json::to_vec(&body)
            .map_err(|e| AppError::InternalError(format!("配对请求序列化失败: {}", e)))?;

        let status = self
            .post_signed("/pair", raw_body, timestamp_seconds)
            .await
            .map_err(|e| AppError::RelayError(e.to_string()))?;

        if !status.is_success() {
            return Err(AppError::RelayError(format!(
                "Relay /pair 返回 {}",
                status
            )));
        }
        Ok(())
    }

    /// 广播"服务器必须升级"（租户级，两个环境各一条）
    pub async fn send_server_update_required(&self, device_repo: &DeviceRepository) {
        self.broadcast("server_update_required", device_repo).await;
    }

    /// 广播"服务器有可用升级"
    pub async fn send_server_update_available(&self, device_repo: &DeviceRepository) {
        self.broadcast("server_update_available", device_repo).await;
    }

    async fn broadcast(&self, event_type: &str, device_repo: &DeviceRepository) {
        // 本地没有任何注册设备时跳过广播
        match device_repo.count_all().await {
            Ok(0) => {
                debug!(event_type = event_type, "无注册设备，跳过广播");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "统计注册设备失败，跳过广播");
                return;
            }
        }

        let ts = crate::utils::epoch_seconds_now();
        for environment in ["sandbox", "production"] {
            self.send_event(event_type, None, "", environment, ts, None, None)
                .await;
        }
    }

    /// 拉取 Relay 元数据（兼容性检查用）
    pub async fn fetch_meta(&self) -> Result<serde_json::Value, AppError> {
        let url = self
            .settings
            .base_url
            .join("/meta")
            .map_err(|e| AppError::RelayError(e.to_string()))?;

        let timestamp = crate::utils::epoch_seconds_now().to_string();
        let nonce = Uuid::new_v4().to_string();
        let signature =
            sign_relay_request(self.secret.expose_secret(), &timestamp, &nonce, b"");

        let response = self
            .client
            .get(url)
            .header("X-Request-ID", Uuid::new_v4().to_string())
            .header("X-Volteec-Nonce", nonce)
            .header("X-Volteec-Signature", signature)
            .send()
            .await
            .map_err(|e| AppError::RelayError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::RelayError(format!(
                "Relay /meta 返回 {}",
                response.status()
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| AppError::RelayError(format!("Relay /meta 响应解析失败: {}", e)))
    }

    /// 发送签名 POST；rawBody 字节即签名内容
    async fn post_signed(
        &self,
        path: &str,
        raw_body: Vec<u8>,
        timestamp_seconds: i64,
    ) -> Result<reqwest::StatusCode, AppError> {
        let url = self
            .settings
            .base_url
            .join(path)
            .map_err(|e| AppError::RelayError(e.to_string()))?;

        let timestamp = timestamp_seconds.to_string();
        let nonce = Uuid::new_v4().to_string();
        let signature = sign_relay_request(
            self.secret.expose_secret(),
            &timestamp,
            &nonce,
            &raw_body,
        );

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("X-Request-ID", Uuid::new_v4().to_string())
            .header("X-Volteec-Nonce", nonce)
            .header("X-Volteec-Signature", signature)
            .body(raw_body)
            .send()
            .await
            .map_err(|e| AppError::RelayError(e.to_string()))?;

        Ok(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_hex_hmac() {
        let sig = sign_relay_request("secret", "1700000000", "nonce-1", b"{}");
        assert_eq!(sig.len(), 64, "HMAC-SHA256 十六进制应为 64 字符");
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));

        // 同输入同输出，任一分量变化则签名变化
        assert_eq!(
            sig,
            sign_relay_request("secret", "1700000000", "nonce-1", b"{}")
        );
        assert_ne!(
            sig,
            sign_relay_request("secret", "1700000001", "nonce-1", b"{}")
        );
        assert_ne!(
            sig,
            sign_relay_request("secret", "1700000000", "nonce-2", b"{}")
        );
        assert_ne!(
            sig,
            sign_relay_request("other", "1700000000", "nonce-1", b"{}")
        );
    }

    #[test]
    fn test_event_body_camel_case() {
        let body = RelayEventBody {
            tenant_id: Uuid::nil(),
            event_id: Uuid::nil(),
            event_type: "ups_status_change".to_string(),
            timestamp: 1_700_000_000,
            environment: "sandbox".to_string(),
            ups_id: "ups1".to_string(),
            status: Some("ups_offline".to_string()),
            server_id: Uuid::nil(),
            battery_level: None,
            installation_id: None,
        };
        let json = serde_json::to_string(&body).unwrap();

        assert!(json.contains("\"tenantId\""));
        assert!(json.contains("\"eventType\""));
        assert!(json.contains("\"upsId\""));
        assert!(json.contains("\"serverId\""));
        // 空可选字段不出现
        assert!(!json.contains("batteryLevel"));
        assert!(!json.contains("installationId"));
    }
}
