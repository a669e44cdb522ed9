//! UPS 快照数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// UPS 运行状态
///
/// 由 NUT 原始标志串推导：含 OL → online；否则含 OB/LB → on_battery；
/// 否则（含标志缺失）→ ups_offline。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "ups_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UpsStatus {
    Online,
    OnBattery,
    UpsOffline,
}

impl UpsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsStatus::Online => "online",
            UpsStatus::OnBattery => "on_battery",
            UpsStatus::UpsOffline => "ups_offline",
        }
    }
}

/// 数据来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "data_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Nut,
    Snmp,
}

/// UPS 快照行（每个 ups_id 一行，只保留最新状态）
///
/// 指标与识别字段全部可空：离线晋升时会被整体清空。
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ups {
    pub ups_id: String,
    pub data_source: DataSource,
    pub status: UpsStatus,
    /// NUT 原始标志串（verbatim，例如 "OL CHRG"）
    pub ups_status_raw: Option<String>,

    // 核心指标
    pub battery_percent: Option<i32>,
    /// 兼容字段：floor(runtime_seconds / 60)
    pub runtime_minutes: Option<i32>,
    pub battery_runtime_seconds: Option<i32>,
    pub load_percent: Option<i32>,
    pub input_voltage: Option<f64>,
    pub output_voltage: Option<f64>,

    // 电池扩展
    pub battery_charge_low: Option<i32>,
    pub battery_charge_warning: Option<i32>,
    pub battery_runtime_low: Option<i32>,
    pub battery_voltage: Option<f64>,
    pub battery_voltage_nominal: Option<f64>,
    pub battery_type: Option<String>,
    pub battery_date: Option<String>,
    pub battery_mfr_date: Option<String>,

    // 设备识别
    pub device_mfr: Option<String>,
    pub device_model: Option<String>,
    pub device_serial: Option<String>,
    pub device_type: Option<String>,

    // 驱动信息
    pub driver_name: Option<String>,
    pub driver_version: Option<String>,
    pub driver_version_internal: Option<String>,
    pub driver_version_data: Option<String>,
    pub driver_poll_freq: Option<i32>,
    pub driver_poll_interval: Option<i32>,

    // 输入/输出
    pub input_voltage_nominal: Option<f64>,
    pub input_sensitivity: Option<String>,
    pub input_transfer_low: Option<f64>,
    pub input_transfer_high: Option<f64>,
    pub output_voltage_nominal: Option<f64>,

    // UPS 自身
    pub ups_beeper_status: Option<String>,
    pub ups_delay_shutdown: Option<i32>,
    pub ups_delay_start: Option<i32>,
    pub ups_timer_shutdown: Option<i32>,
    pub ups_timer_start: Option<i32>,
    pub ups_timer_reboot: Option<i32>,
    pub ups_firmware: Option<String>,
    pub ups_firmware_aux: Option<String>,
    pub ups_mfr: Option<String>,
    pub ups_model: Option<String>,
    pub ups_serial: Option<String>,
    pub ups_vendorid: Option<String>,
    pub ups_productid: Option<String>,
    pub ups_realpower_nominal: Option<i32>,
    pub ups_test_result: Option<String>,

    // 轮询状态
    pub consecutive_failures: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ups {
    /// 原始标志串是否含低电量标志
    pub fn has_low_battery(&self) -> bool {
        self.ups_status_raw
            .as_deref()
            .map(|raw| raw.to_uppercase().contains("LB"))
            .unwrap_or(false)
    }
}

/// 规范化快照（映射器输出，尚未入库）
///
/// 与 [`Ups`] 的差别只在没有轮询状态与时间戳。
#[derive(Debug, Clone, PartialEq)]
pub struct UpsSnapshot {
    pub ups_id: String,
    pub status: UpsStatus,
    pub ups_status_raw: Option<String>,

    pub battery_percent: Option<i32>,
    pub runtime_minutes: Option<i32>,
    pub battery_runtime_seconds: Option<i32>,
    pub load_percent: Option<i32>,
    pub input_voltage: Option<f64>,
    pub output_voltage: Option<f64>,

    pub battery_charge_low: Option<i32>,
    pub battery_charge_warning: Option<i32>,
    pub battery_runtime_low: Option<i32>,
    pub battery_voltage: Option<f64>,
    pub battery_voltage_nominal: Option<f64>,
    pub battery_type: Option<String>,
    pub battery_date: Option<String>,
    pub battery_mfr_date: Option<String>,

    pub device_mfr: Option<String>,
    pub device_model: Option<String>,
    pub device_serial: Option<String>,
    pub device_type: Option<String>,

    pub driver_name: Option<String>,
    pub driver_version: Option<String>,
    pub driver_version_internal: Option<String>,
    pub driver_version_data: Option<String>,
    pub driver_poll_freq: Option<i32>,
    pub driver_poll_interval: Option<i32>,

    pub input_voltage_nominal: Option<f64>,
    pub input_sensitivity: Option<String>,
    pub input_transfer_low: Option<f64>,
    pub input_transfer_high: Option<f64>,
    pub output_voltage_nominal: Option<f64>,

    pub ups_beeper_status: Option<String>,
    pub ups_delay_shutdown: Option<i32>,
    pub ups_delay_start: Option<i32>,
    pub ups_timer_shutdown: Option<i32>,
    pub ups_timer_start: Option<i32>,
    pub ups_timer_reboot: Option<i32>,
    pub ups_firmware: Option<String>,
    pub ups_firmware_aux: Option<String>,
    pub ups_mfr: Option<String>,
    pub ups_model: Option<String>,
    pub ups_serial: Option<String>,
    pub ups_vendorid: Option<String>,
    pub ups_productid: Option<String>,
    pub ups_realpower_nominal: Option<i32>,
    pub ups_test_result: Option<String>,
}

impl UpsSnapshot {
    /// 原始标志串是否含低电量标志
    pub fn has_low_battery(&self) -> bool {
        self.ups_status_raw
            .as_deref()
            .map(|raw| raw.to_uppercase().contains("LB"))
            .unwrap_or(false)
    }
}

/// SSE 数据帧载荷：快照全部字段 + 协议版本 + 发送时刻
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsStatusPayload {
    pub schema_version: &'static str,
    /// 发送时刻（ISO-8601）
    pub updated_at: String,
    #[serde(flatten)]
    pub ups: Ups,
}

impl UpsStatusPayload {
    pub fn new(ups: Ups) -> Self {
        Self {
            schema_version: "1.0",
            updated_at: crate::utils::format_iso8601(&Utc::now()),
            ups,
        }
    }
}

/// SSE 心跳帧载荷
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    pub schema_version: &'static str,
    pub timestamp: String,
}

impl HeartbeatPayload {
    pub fn now() -> Self {
        Self {
            schema_version: "1.0",
            timestamp: crate::utils::format_iso8601(&Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(UpsStatus::Online.as_str(), "online");
        assert_eq!(UpsStatus::OnBattery.as_str(), "on_battery");
        assert_eq!(UpsStatus::UpsOffline.as_str(), "ups_offline");
    }
}
