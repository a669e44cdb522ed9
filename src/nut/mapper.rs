//! NUT 变量到规范化快照的映射
//!
//! 纯函数，无 I/O。数值转换规则：百分比类字段四舍五入，
//! 时间/计数类字段截断取整。

use crate::models::{UpsSnapshot, UpsStatus};
use std::collections::HashMap;

/// 把原始变量表映射为规范化快照
pub fn map_variables(ups_name: &str, vars: &HashMap<String, String>) -> UpsSnapshot {
    let battery_runtime_seconds = get_trunc(vars, "battery.runtime");

    UpsSnapshot {
        ups_id: ups_name.to_lowercase(),
        status: derive_status(vars.get("ups.status").map(|s| s.as_str())),
        ups_status_raw: get_string(vars, "ups.status"),

        battery_percent: get_round(vars, "battery.charge"),
        runtime_minutes: battery_runtime_seconds.map(|s| s / 60),
        battery_runtime_seconds,
        load_percent: get_round(vars, "ups.load"),
        input_voltage: get_f64(vars, "input.voltage"),
        output_voltage: get_f64(vars, "output.voltage"),

        battery_charge_low: get_round(vars, "battery.charge.low"),
        battery_charge_warning: get_round(vars, "battery.charge.warning"),
        battery_runtime_low: get_trunc(vars, "battery.runtime.low"),
        battery_voltage: get_f64(vars, "battery.voltage"),
        battery_voltage_nominal: get_f64(vars, "battery.voltage.nominal"),
        battery_type: get_string(vars, "battery.type"),
        battery_date: get_string(vars, "battery.date"),
        battery_mfr_date: get_string(vars, "battery.mfr.date"),

        device_mfr: get_string(vars, "device.mfr"),
        device_model: get_string(vars, "device.model"),
        device_serial: get_string(vars, "device.serial"),
        device_type: get_string(vars, "device.type"),

        driver_name: get_string(vars, "driver.name"),
        driver_version: get_string(vars, "driver.version"),
        driver_version_internal: get_string(vars, "driver.version.internal"),
        driver_version_data: get_string(vars, "driver.version.data"),
        driver_poll_freq: get_trunc(vars, "driver.parameter.pollfreq"),
        driver_poll_interval: get_trunc(vars, "driver.parameter.pollinterval"),

        input_voltage_nominal: get_f64(vars, "input.voltage.nominal"),
        input_sensitivity: get_string(vars, "input.sensitivity"),
        input_transfer_low: get_f64(vars, "input.transfer.low"),
        input_transfer_high: get_f64(vars, "input.transfer.high"),
        output_voltage_nominal: get_f64(vars, "output.voltage.nominal"),

        ups_beeper_status: get_string(vars, "ups.beeper.status"),
        ups_delay_shutdown: get_trunc(vars, "ups.delay.shutdown"),
        ups_delay_start: get_trunc(vars, "ups.delay.start"),
        ups_timer_shutdown: get_trunc(vars, "ups.timer.shutdown"),
        ups_timer_start: get_trunc(vars, "ups.timer.start"),
        ups_timer_reboot: get_trunc(vars, "ups.timer.reboot"),
        ups_firmware: get_string(vars, "ups.firmware"),
        ups_firmware_aux: get_string(vars, "ups.firmware.aux"),
        ups_mfr: get_string(vars, "ups.mfr"),
        ups_model: get_string(vars, "ups.model"),
        ups_serial: get_string(vars, "ups.serial"),
        ups_vendorid: get_string(vars, "ups.vendorid"),
        ups_productid: get_string(vars, "ups.productid"),
        ups_realpower_nominal: get_trunc(vars, "ups.realpower.nominal"),
        ups_test_result: get_string(vars, "ups.test.result"),
    }
}

/// 从原始标志串推导状态（大小写不敏感）
///
/// 优先级：OL > OB/LB > 离线（标志缺失同样视为离线）。
pub fn derive_status(raw: Option<&str>) -> UpsStatus {
    let raw = match raw {
        Some(r) => r.to_uppercase(),
        None => return UpsStatus::UpsOffline,
    };

    if raw.contains("OL") {
        UpsStatus::Online
    } else if raw.contains("OB") || raw.contains("LB") {
        UpsStatus::OnBattery
    } else {
        UpsStatus::UpsOffline
    }
}

fn get_string(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key).map(|s| s.to_string())
}

fn get_f64(vars: &HashMap<String, String>, key: &str) -> Option<f64> {
    vars.get(key).and_then(|s| s.trim().parse::<f64>().ok())
}

/// 四舍五入取整（百分比类字段）
fn get_round(vars: &HashMap<String, String>, key: &str) -> Option<i32> {
    get_f64(vars, key).map(|v| v.round() as i32)
}

/// 截断取整（时间/计数类字段）
fn get_trunc(vars: &HashMap<String, String>, key: &str) -> Option<i32> {
    get_f64(vars, key).map(|v| v.trunc() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_derive_status_priority() {
        assert_eq!(derive_status(Some("OL CHRG")), UpsStatus::Online);
        assert_eq!(derive_status(Some("OB LB")), UpsStatus::OnBattery);
        assert_eq!(derive_status(Some("LB")), UpsStatus::OnBattery);
        assert_eq!(derive_status(Some("")), UpsStatus::UpsOffline);
        assert_eq!(derive_status(None), UpsStatus::UpsOffline);
    }

    #[test]
    fn test_derive_status_case_insensitive() {
        assert_eq!(derive_status(Some("ol")), UpsStatus::Online);
        assert_eq!(derive_status(Some("ob lb")), UpsStatus::OnBattery);
    }

    #[test]
    fn test_rounding_rules() {
        let snapshot = map_variables(
            "UPS1",
            &vars(&[
                ("ups.status", "OL"),
                ("battery.charge", "87.4"),
                ("ups.load", "12.6"),
                ("battery.runtime", "1319.8"),
            ]),
        );

        assert_eq!(snapshot.ups_id, "ups1");
        assert_eq!(snapshot.battery_percent, Some(87));
        assert_eq!(snapshot.load_percent, Some(13));
        // 时间类截断而非四舍五入
        assert_eq!(snapshot.battery_runtime_seconds, Some(1319));
        assert_eq!(snapshot.runtime_minutes, Some(21));
    }

    #[test]
    fn test_missing_keys_are_none() {
        let snapshot = map_variables("ups1", &vars(&[("ups.status", "OL")]));
        assert_eq!(snapshot.battery_percent, None);
        assert_eq!(snapshot.runtime_minutes, None);
        assert_eq!(snapshot.input_voltage, None);
        assert_eq!(snapshot.ups_model, None);
    }

    #[test]
    fn test_unparsable_number_is_none() {
        let snapshot = map_variables(
            "ups1",
            &vars(&[("ups.status", "OL"), ("battery.charge", "n/a")]),
        );
        assert_eq!(snapshot.battery_percent, None);
    }

    #[test]
    fn test_low_battery_flag() {
        let snapshot = map_variables("ups1", &vars(&[("ups.status", "OB LB")]));
        assert!(snapshot.has_low_battery());

        let snapshot = map_variables("ups1", &vars(&[("ups.status", "OL")]));
        assert!(!snapshot.has_low_battery());
    }
}
