//! 设备注册数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// 推送环境
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "device_environment", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceEnvironment {
    Sandbox,
    Production,
}

impl Default for DeviceEnvironment {
    fn default() -> Self {
        DeviceEnvironment::Sandbox
    }
}

impl DeviceEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceEnvironment::Sandbox => "sandbox",
            DeviceEnvironment::Production => "production",
        }
    }

    /// 从环境标记字符串解析（Relay 配置侧用字符串表示）
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sandbox" => Some(DeviceEnvironment::Sandbox),
            "production" => Some(DeviceEnvironment::Production),
            _ => None,
        }
    }
}

/// 设备注册行
///
/// `device_token` 落库前经 AES-GCM 加密；`token_hash` 是明文令牌的
/// SHA-256 摘要（十六进制），用于免解密定位。
#[derive(Debug, Clone, FromRow)]
pub struct Device {
    pub id: Uuid,
    pub ups_id: String,
    pub ups_alias: Option<String>,
    pub device_token: String,
    pub token_hash: String,
    pub installation_id: Option<Uuid>,
    pub server_id: Option<Uuid>,
    pub ups_hidden: bool,
    pub environment: DeviceEnvironment,
    pub created_at: DateTime<Utc>,
}

/// 注册设备请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    #[serde(default)]
    pub api_version: Option<String>,

    #[validate(length(min = 1, max = 64, message = "upsId 长度应在 1-64 之间"))]
    pub ups_id: String,

    #[serde(default)]
    pub ups_alias: Option<String>,

    #[validate(length(min = 1, max = 4096, message = "deviceToken 不能为空"))]
    pub device_token: String,

    #[serde(default)]
    pub environment: Option<DeviceEnvironment>,

    #[serde(default)]
    pub installation_id: Option<Uuid>,

    #[serde(default)]
    pub ups_hidden: Option<bool>,
}

/// 注销设备请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterDeviceRequest {
    #[serde(default)]
    pub api_version: Option<String>,

    #[validate(length(min = 1, max = 64, message = "upsId 长度应在 1-64 之间"))]
    pub ups_id: String,

    #[validate(length(min = 1, max = 4096, message = "deviceToken 不能为空"))]
    pub device_token: String,

    #[serde(default)]
    pub environment: Option<DeviceEnvironment>,

    #[serde(default)]
    pub installation_id: Option<Uuid>,
}

/// 注册/注销响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMutationResponse {
    pub success: bool,
    pub created: bool,
}

/// 配对响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairResponse {
    pub api_version: &'static str,
    pub relay_url: String,
    pub pair_code: String,
    pub server_id: Uuid,
}

/// 服务器状态响应（/v1/status）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatusResponse {
    pub version: String,
    pub protocol_version: String,
    pub compatibility: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(
            DeviceEnvironment::parse("sandbox"),
            Some(DeviceEnvironment::Sandbox)
        );
        assert_eq!(
            DeviceEnvironment::parse("production"),
            Some(DeviceEnvironment::Production)
        );
        assert_eq!(DeviceEnvironment::parse("staging"), None);
        assert_eq!(DeviceEnvironment::parse(""), None);
    }
}
