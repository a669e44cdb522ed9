//! SSE 推流处理器
//!
//! 每个 HTTP 连接一个消费任务：先发全量快照，之后转发总线事件并按 10 秒
//! 间隔发心跳。客户端死亡只有一种信号——响应体写入失败；检测到即退订、
//! 停心跳、关流（从不主动探测）。

use crate::errors::AppError;
use crate::metrics::Metrics;
use crate::models::{HeartbeatPayload, Ups, UpsStatusPayload};
use crate::repositories::UpsRepository;
use crate::services::{EventBus, EventType, UpsEvent};
use crate::sse::limiter::{parse_rate, GlobalMetricsLimiter, PerUpsRateLimiter};

use actix_web::web::Bytes;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 心跳间隔
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// `/v1/events` 查询参数
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub rate: Option<String>,
}

/// SSE 帧
fn format_frame(event_type: &str, json: &str) -> Bytes {
    Bytes::from(format!("event: {}\ndata: {}\n\n", event_type, json))
}

fn metrics_frame(ups: Ups) -> Result<Bytes, AppError> {
    let payload = UpsStatusPayload::new(ups);
    let json = serde_json::to_string(&payload)
        .map_err(|e| AppError::InternalError(format!("SSE 载荷序列化失败: {}", e)))?;
    Ok(format_frame("metrics_update", &json))
}

/// SSE 连接升级处理器
///
/// 端点: GET /v1/events?rate=1s|3s|5s
pub async fn sse_handler(
    query: web::Query<EventsQuery>,
    bus: web::Data<Arc<EventBus>>,
    ups_repo: web::Data<UpsRepository>,
    global_limiter: web::Data<Arc<GlobalMetricsLimiter>>,
    metrics: web::Data<Arc<Metrics>>,
) -> Result<HttpResponse, AppError> {
    let interval = parse_rate(query.rate.as_deref());

    // 订阅失败（达到上限）时不发送任何帧直接终止
    let (subscription_id, event_rx) = bus.subscribe().map_err(|e| {
        warn!("SSE 订阅被拒绝: {}", e);
        AppError::ServiceUnavailable("订阅者数量达到上限".to_string())
    })?;

    // 快照阶段的数据在订阅之后读取，保证不漏事件
    let snapshot = match ups_repo.find_all().await {
        Ok(rows) => rows,
        Err(e) => {
            bus.unsubscribe(subscription_id);
            return Err(e);
        }
    };

    info!(
        subscription_id = %subscription_id,
        rate_secs = interval.as_secs(),
        snapshot_rows = snapshot.len(),
        "SSE 连接建立"
    );
    metrics.sse_connected();

    let (body_tx, body_rx) = mpsc::unbounded_channel::<Result<Bytes, AppError>>();
    tokio::spawn(connection_task(
        subscription_id,
        event_rx,
        body_tx,
        snapshot,
        interval,
        bus.get_ref().clone(),
        global_limiter.get_ref().clone(),
        metrics.get_ref().clone(),
    ));

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(UnboundedReceiverStream::new(body_rx)))
}

/// 单连接消费任务
#[allow(clippy::too_many_arguments)]
async fn connection_task(
    subscription_id: Uuid,
    mut event_rx: mpsc::Receiver<UpsEvent>,
    body_tx: mpsc::UnboundedSender<Result<Bytes, AppError>>,
    snapshot: Vec<Ups>,
    interval: Duration,
    bus: Arc<EventBus>,
    global_limiter: Arc<GlobalMetricsLimiter>,
    metrics: Arc<Metrics>,
) {
    let mut per_ups = PerUpsRateLimiter::new(interval);
    let mut client_dead = false;

    // 快照阶段：每行一个 metrics_update 帧
    for ups in snapshot {
        let ups_id = ups.ups_id.clone();
        match metrics_frame(ups) {
            Ok(frame) => {
                if body_tx.send(Ok(frame)).is_err() {
                    client_dead = true;
                    break;
                }
                per_ups.record(&ups_id);
                metrics.incr_sse_frames_sent();
            }
            Err(e) => {
                warn!(subscription_id = %subscription_id, error = %e, "快照帧构建失败");
                client_dead = true;
                break;
            }
        }
    }

    // 心跳从连接建立后一个完整间隔开始
    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    );

    while !client_dead {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        if !forward_event(
                            event,
                            &body_tx,
                            &mut per_ups,
                            &global_limiter,
                            &metrics,
                        ) {
                            client_dead = true;
                        }
                    }
                    // 发送端全部关闭：订阅已被移除
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                let payload = HeartbeatPayload::now();
                let json = match serde_json::to_string(&payload) {
                    Ok(j) => j,
                    Err(_) => continue,
                };
                if body_tx.send(Ok(format_frame("heartbeat", &json))).is_err() {
                    client_dead = true;
                }
            }
        }
    }

    // 退订 + 停心跳（任务退出即停）+ 关流（发送端随任务丢弃）
    bus.unsubscribe(subscription_id);
    metrics.sse_disconnected();
    if client_dead {
        metrics.incr_sse_clients_dropped();
    }
    debug!(subscription_id = %subscription_id, "SSE 连接清理完成");
}

/// 转发一个总线事件；返回 false 表示客户端已死
fn forward_event(
    event: UpsEvent,
    body_tx: &mpsc::UnboundedSender<Result<Bytes, AppError>>,
    per_ups: &mut PerUpsRateLimiter,
    global_limiter: &GlobalMetricsLimiter,
    metrics: &Metrics,
) -> bool {
    let ups_id = event.ups.ups_id.clone();

    match event.event_type {
        // 状态变化总是尝试发送
        EventType::StatusChange => {
            let frame = match serde_json::to_string(&UpsStatusPayload::new(event.ups)) {
                Ok(json) => format_frame("status_change", &json),
                Err(_) => return true,
            };
            if body_tx.send(Ok(frame)).is_err() {
                return false;
            }
            metrics.incr_sse_frames_sent();
        }
        // 指标帧要双限流器同时放行
        EventType::MetricsUpdate => {
            if !per_ups.check(&ups_id) || !global_limiter.allow() {
                metrics.incr_sse_frames_rate_limited();
                return true;
            }
            let frame = match serde_json::to_string(&UpsStatusPayload::new(event.ups)) {
                Ok(json) => format_frame("metrics_update", &json),
                Err(_) => return true,
            };
            if body_tx.send(Ok(frame)).is_err() {
                return false;
            }
            per_ups.record(&ups_id);
            metrics.incr_sse_frames_sent();
        }
    }

    true
}
