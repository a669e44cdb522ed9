//! SSE 载荷与 API 序列化合同测试

use chrono::Utc;
use volteec::models::{
    DataSource, HeartbeatPayload, Ups, UpsStatus, UpsStatusPayload,
};

fn sample_ups() -> Ups {
    Ups {
        ups_id: "ups1".to_string(),
        data_source: DataSource::Nut,
        status: UpsStatus::Online,
        ups_status_raw: Some("OL CHRG".to_string()),
        battery_percent: Some(87),
        runtime_minutes: Some(21),
        battery_runtime_seconds: Some(1319),
        load_percent: Some(13),
        input_voltage: Some(229.6),
        output_voltage: Some(230.1),
        battery_charge_low: Some(10),
        battery_charge_warning: Some(20),
        battery_runtime_low: Some(120),
        battery_voltage: Some(13.5),
        battery_voltage_nominal: Some(12.0),
        battery_type: Some("PbAc".to_string()),
        battery_date: None,
        battery_mfr_date: None,
        device_mfr: Some("APC".to_string()),
        device_model: None,
        device_serial: None,
        device_type: Some("ups".to_string()),
        driver_name: Some("usbhid-ups".to_string()),
        driver_version: None,
        driver_version_internal: None,
        driver_version_data: None,
        driver_poll_freq: Some(30),
        driver_poll_interval: Some(2),
        input_voltage_nominal: Some(230.0),
        input_sensitivity: None,
        input_transfer_low: None,
        input_transfer_high: None,
        output_voltage_nominal: None,
        ups_beeper_status: Some("enabled".to_string()),
        ups_delay_shutdown: Some(20),
        ups_delay_start: None,
        ups_timer_shutdown: Some(-1),
        ups_timer_start: None,
        ups_timer_reboot: None,
        ups_firmware: None,
        ups_firmware_aux: None,
        ups_mfr: Some("APC".to_string()),
        ups_model: Some("Back-UPS RS 900G".to_string()),
        ups_serial: None,
        ups_vendorid: Some("051d".to_string()),
        ups_productid: Some("0002".to_string()),
        ups_realpower_nominal: Some(540),
        ups_test_result: None,
        consecutive_failures: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn test_status_payload_shape() {
    let payload = UpsStatusPayload::new(sample_ups());
    let value: serde_json::Value = serde_json::to_value(&payload).unwrap();

    assert_eq!(value["schemaVersion"], "1.0");
    assert_eq!(value["upsId"], "ups1");
    assert_eq!(value["status"], "online");
    assert_eq!(value["upsStatusRaw"], "OL CHRG");
    assert_eq!(value["batteryPercent"], 87);
    assert_eq!(value["runtimeMinutes"], 21);
    assert_eq!(value["loadPercent"], 13);
    assert_eq!(value["consecutiveFailures"], 0);
    assert_eq!(value["dataSource"], "nut");

    // updatedAt 是 ISO-8601
    let updated_at = value["updatedAt"].as_str().expect("updatedAt 应存在");
    assert!(updated_at.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(updated_at).is_ok());
}

#[test]
fn test_status_payload_keys_are_camel_case() {
    let payload = UpsStatusPayload::new(sample_ups());
    let json = serde_json::to_string(&payload).unwrap();

    assert!(json.contains("\"batteryRuntimeSeconds\""));
    assert!(json.contains("\"inputVoltage\""));
    assert!(json.contains("\"upsBeeperStatus\""));
    assert!(!json.contains("\"battery_percent\""), "不应出现 snake_case 键");
}

#[test]
fn test_heartbeat_payload() {
    let payload = HeartbeatPayload::now();
    let value: serde_json::Value = serde_json::to_value(&payload).unwrap();

    assert_eq!(value["schemaVersion"], "1.0");
    let ts = value["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
}

#[test]
fn test_status_enum_wire_values() {
    assert_eq!(
        serde_json::to_string(&UpsStatus::Online).unwrap(),
        "\"online\""
    );
    assert_eq!(
        serde_json::to_string(&UpsStatus::OnBattery).unwrap(),
        "\"on_battery\""
    );
    assert_eq!(
        serde_json::to_string(&UpsStatus::UpsOffline).unwrap(),
        "\"ups_offline\""
    );
}

#[test]
fn test_low_battery_detection() {
    let mut ups = sample_ups();
    assert!(!ups.has_low_battery());

    ups.ups_status_raw = Some("OB LB".to_string());
    assert!(ups.has_low_battery());

    // 大小写不敏感
    ups.ups_status_raw = Some("ob lb".to_string());
    assert!(ups.has_low_battery());

    ups.ups_status_raw = None;
    assert!(!ups.has_low_battery());
}
