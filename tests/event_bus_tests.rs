//! 事件总线语义测试

use chrono::Utc;
use volteec::models::{DataSource, Ups, UpsStatus};
use volteec::services::{EventBus, EventType, UpsEvent, MAX_SUBSCRIBERS};

/// 构造一个最小快照行
fn sample_ups(ups_id: &str, status: UpsStatus, raw: Option<&str>) -> Ups {
    Ups {
        ups_id: ups_id.to_string(),
        data_source: DataSource::Nut,
        status,
        ups_status_raw: raw.map(str::to_string),
        battery_percent: Some(87),
        runtime_minutes: Some(21),
        battery_runtime_seconds: Some(1319),
        load_percent: Some(13),
        input_voltage: Some(229.6),
        output_voltage: Some(230.1),
        battery_charge_low: None,
        battery_charge_warning: None,
        battery_runtime_low: None,
        battery_voltage: None,
        battery_voltage_nominal: None,
        battery_type: None,
        battery_date: None,
        battery_mfr_date: None,
        device_mfr: None,
        device_model: None,
        device_serial: None,
        device_type: None,
        driver_name: None,
        driver_version: None,
        driver_version_internal: None,
        driver_version_data: None,
        driver_poll_freq: None,
        driver_poll_interval: None,
        input_voltage_nominal: None,
        input_sensitivity: None,
        input_transfer_low: None,
        input_transfer_high: None,
        output_voltage_nominal: None,
        ups_beeper_status: None,
        ups_delay_shutdown: None,
        ups_delay_start: None,
        ups_timer_shutdown: None,
        ups_timer_start: None,
        ups_timer_reboot: None,
        ups_firmware: None,
        ups_firmware_aux: None,
        ups_mfr: None,
        ups_model: None,
        ups_serial: None,
        ups_vendorid: None,
        ups_productid: None,
        ups_realpower_nominal: None,
        ups_test_result: None,
        consecutive_failures: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[actix_web::test]
async fn test_publish_reaches_subscriber() {
    let bus = EventBus::new();
    let (_id, mut rx) = bus.subscribe().unwrap();

    bus.publish(UpsEvent::metrics_update(sample_ups(
        "ups1",
        UpsStatus::Online,
        Some("OL"),
    )))
    .await;

    let event = rx.recv().await.expect("应收到事件");
    assert_eq!(event.event_type, EventType::MetricsUpdate);
    assert_eq!(event.ups.ups_id, "ups1");
    assert!(!event.has_low_battery);
}

#[actix_web::test]
async fn test_low_battery_flag_follows_raw_status() {
    let bus = EventBus::new();
    let (_id, mut rx) = bus.subscribe().unwrap();

    bus.publish(UpsEvent::status_change(
        sample_ups("ups1", UpsStatus::OnBattery, Some("OB LB")),
        Some(UpsStatus::Online),
    ))
    .await;

    let event = rx.recv().await.unwrap();
    assert!(event.has_low_battery, "原始串含 LB 时事件应带低电量标记");
    assert_eq!(event.previous_status, Some(UpsStatus::Online));
}

#[actix_web::test]
async fn test_events_arrive_in_publish_order() {
    let bus = EventBus::new();
    let (_id, mut rx) = bus.subscribe().unwrap();

    for percent in [10, 20, 30] {
        let mut ups = sample_ups("ups1", UpsStatus::Online, Some("OL"));
        ups.battery_percent = Some(percent);
        bus.publish(UpsEvent::metrics_update(ups)).await;
    }

    // publish 对订阅者同步完成，单 UPS 的事件按发布顺序到达
    assert_eq!(rx.recv().await.unwrap().ups.battery_percent, Some(10));
    assert_eq!(rx.recv().await.unwrap().ups.battery_percent, Some(20));
    assert_eq!(rx.recv().await.unwrap().ups.battery_percent, Some(30));
}

#[actix_web::test]
async fn test_subscriber_limit() {
    let bus = EventBus::new();

    let mut receivers = Vec::new();
    for i in 0..MAX_SUBSCRIBERS {
        let (_, rx) = bus
            .subscribe()
            .unwrap_or_else(|_| panic!("第 {} 个订阅应成功", i + 1));
        receivers.push(rx);
    }
    assert_eq!(bus.subscriber_count(), MAX_SUBSCRIBERS);

    // 第 101 个订阅被拒绝，且不影响已有订阅
    assert!(bus.subscribe().is_err(), "超出上限的订阅应失败");
    assert_eq!(bus.subscriber_count(), MAX_SUBSCRIBERS);
}

#[actix_web::test]
async fn test_unsubscribe_is_idempotent() {
    let bus = EventBus::new();
    let (id, mut rx) = bus.subscribe().unwrap();

    bus.unsubscribe(id);
    bus.unsubscribe(id);
    assert_eq!(bus.subscriber_count(), 0);

    // 退订后发送端关闭，接收端读到 None
    bus.publish(UpsEvent::metrics_update(sample_ups(
        "ups1",
        UpsStatus::Online,
        Some("OL"),
    )))
    .await;
    assert!(rx.recv().await.is_none(), "退订后不应再收到事件");
}

#[actix_web::test]
async fn test_dropped_receiver_does_not_block_publish() {
    let bus = EventBus::new();
    let (id, rx) = bus.subscribe().unwrap();
    drop(rx);

    // 接收端已消失：publish 应立即完成而不是阻塞
    tokio::time::timeout(
        std::time::Duration::from_secs(1),
        bus.publish(UpsEvent::metrics_update(sample_ups(
            "ups1",
            UpsStatus::Online,
            Some("OL"),
        ))),
    )
    .await
    .expect("publish 不应被死订阅者阻塞");

    bus.unsubscribe(id);
}

#[actix_web::test]
async fn test_slot_freed_after_unsubscribe() {
    let bus = EventBus::new();

    let mut ids = Vec::new();
    let mut receivers = Vec::new();
    for _ in 0..MAX_SUBSCRIBERS {
        let (id, rx) = bus.subscribe().unwrap();
        ids.push(id);
        receivers.push(rx);
    }
    assert!(bus.subscribe().is_err());

    bus.unsubscribe(ids[0]);
    assert!(bus.subscribe().is_ok(), "退订后应立刻腾出名额");
}
