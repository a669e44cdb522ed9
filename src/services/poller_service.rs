//! NUT 轮询器
//!
//! 进程内唯一长驻轮询任务：顺序轮询配置的 UPS 列表，把快照写入仓库、
//! 向事件总线发布、在状态迁移时向 Relay 推送。UPS 表与 `last_status_map`
//! 都只有这个任务写。

use crate::config::NutSettings;
use crate::metrics::Metrics;
use crate::models::UpsStatus;
use crate::nut::{map_variables, NutClient, NutError};
use crate::repositories::UpsRepository;
use crate::services::{EventBus, RelayService, UpsEvent};
use crate::utils::epoch_seconds_now;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// 单 UPS 重试前的等待（秒）：首次立即，之后 1 s、2 s
const RETRY_DELAYS_SECS: [u64; 3] = [0, 1, 2];

/// Relay 心跳的最小间隔
const HEARTBEAT_MIN_INTERVAL: Duration = Duration::from_secs(60);

/// NUT 轮询器
pub struct PollerService {
    nut: NutSettings,
    ups_repo: UpsRepository,
    bus: Arc<EventBus>,
    relay: Option<Arc<RelayService>>,
    metrics: Arc<Metrics>,
    /// 上一轮写入的状态；状态变化判定以它为准，缺省回退到 DB 旧值
    last_status_map: HashMap<String, UpsStatus>,
    last_heartbeat: Option<Instant>,
}

impl PollerService {
    pub fn new(
        nut: NutSettings,
        ups_repo: UpsRepository,
        bus: Arc<EventBus>,
        relay: Option<Arc<RelayService>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            nut,
            ups_repo,
            bus,
            relay,
            metrics,
            last_status_map: HashMap::new(),
            last_heartbeat: None,
        }
    }

    /// 轮询主循环：先睡一个间隔再轮询（启动时不抢跑）
    ///
    /// 停机信号在睡眠与单 UPS 之间生效。
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs_f64(self.nut.poll_interval);
        info!(
            host = %self.nut.host,
            port = self.nut.port,
            ups_count = self.nut.ups_names.len(),
            interval_secs = self.nut.poll_interval,
            "轮询器启动"
        );

        'outer: loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break 'outer;
                    }
                }
            }

            self.metrics.incr_poll_cycles();
            let ups_names = self.nut.ups_names.clone();
            for ups_name in &ups_names {
                if *shutdown.borrow() {
                    break 'outer;
                }
                self.poll_one(ups_name).await;
            }

            self.maybe_send_heartbeat();
        }

        info!("轮询器已停止");
    }

    /// 轮询单个 UPS
    async fn poll_one(&mut self, ups_name: &str) {
        match self.fetch_with_retry(ups_name).await {
            Ok(vars) => self.handle_success(ups_name, vars).await,
            Err(e) => self.handle_failure(ups_name, e).await,
        }
    }

    /// 最多 3 次尝试，每次全新连接，结束即断开
    async fn fetch_with_retry(
        &self,
        ups_name: &str,
    ) -> Result<HashMap<String, String>, NutError> {
        let mut last_error = NutError::ConnectionFailed("未尝试".to_string());

        for (attempt, delay) in RETRY_DELAYS_SECS.iter().enumerate() {
            if *delay > 0 {
                tokio::time::sleep(Duration::from_secs(*delay)).await;
            }

            let mut client = NutClient::new(
                self.nut.host.clone(),
                self.nut.port,
                self.nut.username.clone(),
                self.nut.password.clone(),
            );

            let result = async {
                client.connect().await?;
                client.fetch_variables(ups_name).await
            }
            .await;
            client.disconnect().await;

            match result {
                Ok(vars) => return Ok(vars),
                Err(e) => {
                    warn!(
                        ups_id = ups_name,
                        attempt = attempt + 1,
                        error = %e,
                        "NUT 拉取失败"
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// 成功路径：映射、入库、发布事件、必要时推 Relay
    async fn handle_success(&mut self, ups_name: &str, vars: HashMap<String, String>) {
        let snapshot = map_variables(ups_name, &vars);

        let (ups, repo_previous) = match self.ups_repo.upsert(&snapshot).await {
            Ok(result) => result,
            Err(e) => {
                error!(ups_id = ups_name, error = %e, "快照入库失败");
                return;
            }
        };
        self.metrics.incr_poll_success();

        // 内存中的上一轮状态优先于 DB 旧值：DB 行在比较前已被本次更新覆盖
        let previous = self
            .last_status_map
            .get(&ups.ups_id)
            .copied()
            .or(repo_previous);
        self.last_status_map.insert(ups.ups_id.clone(), ups.status);

        let changed = previous.map(|p| p != ups.status).unwrap_or(false);
        if changed {
            info!(
                ups_id = %ups.ups_id,
                from = ?previous,
                to = ups.status.as_str(),
                "UPS 状态变化"
            );

            self.publish(UpsEvent::status_change(ups.clone(), previous)).await;

            if let Some(relay) = &self.relay {
                let event_type = if ups.has_low_battery() {
                    "battery_low"
                } else {
                    "ups_status_change"
                };
                self.spawn_relay_event(
                    relay.clone(),
                    event_type,
                    ups.status,
                    ups.ups_id.clone(),
                    ups.battery_percent,
                );
            }
        }

        self.publish(UpsEvent::metrics_update(ups)).await;
    }

    /// 失败路径：登记失败，达到阈值则晋升离线
    async fn handle_failure(&mut self, ups_name: &str, error: NutError) {
        self.metrics.incr_poll_failure();
        warn!(ups_id = ups_name, error = %error, "本轮 NUT 轮询失败");

        let ups_id = ups_name.to_lowercase();
        let outcome = match self.ups_repo.register_failure(&ups_id).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                // 该 UPS 从未成功轮询过，没有可降级的行
                debug!(ups_id = %ups_id, "尚无快照行，跳过失败登记");
                return;
            }
            Err(e) => {
                error!(ups_id = %ups_id, error = %e, "失败登记写库失败");
                return;
            }
        };

        if !outcome.status_changed {
            return;
        }

        info!(
            ups_id = %ups_id,
            failures = outcome.ups.consecutive_failures,
            "连续失败达到阈值，UPS 标记为离线"
        );
        self.last_status_map
            .insert(ups_id.clone(), UpsStatus::UpsOffline);

        // 离线晋升只发布状态变化；没有新指标可发
        self.publish(UpsEvent::status_change(
            outcome.ups.clone(),
            Some(outcome.previous_status),
        ))
        .await;

        if let Some(relay) = &self.relay {
            self.spawn_relay_event(
                relay.clone(),
                "ups_status_change",
                UpsStatus::UpsOffline,
                ups_id,
                None,
            );
        }
    }

    async fn publish(&self, event: UpsEvent) {
        self.bus.publish(event).await;
        self.metrics.incr_events_published();
    }

    /// Relay 推送从不阻塞轮询循环
    fn spawn_relay_event(
        &self,
        relay: Arc<RelayService>,
        event_type: &'static str,
        status: UpsStatus,
        ups_id: String,
        battery_level: Option<i32>,
    ) {
        let environment = relay.environment().to_string();
        tokio::spawn(async move {
            relay
                .send_event(
                    event_type,
                    Some(status.as_str()),
                    &ups_id,
                    &environment,
                    epoch_seconds_now(),
                    battery_level,
                    None,
                )
                .await;
        });
    }

    /// 列表跑完后至多每 60 秒发一次 Relay 心跳
    fn maybe_send_heartbeat(&mut self) {
        let relay = match &self.relay {
            Some(r) => r.clone(),
            None => return,
        };

        let due = self
            .last_heartbeat
            .map(|t| t.elapsed() >= HEARTBEAT_MIN_INTERVAL)
            .unwrap_or(true);
        if !due {
            return;
        }
        self.last_heartbeat = Some(Instant::now());

        tokio::spawn(async move {
            relay.send_heartbeat(epoch_seconds_now()).await;
        });
    }
}
