//! 服务器更新检查守护
//!
//! 每日拉取一次 Relay 的 `/meta` 元数据，把本服务器的协议版本分类为
//! 兼容性状态，供 `/v1/status` 读取；降级/淘汰时向租户广播升级提醒。

use crate::repositories::DeviceRepository;
use crate::services::RelayService;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// 本服务器实现的 Relay 协议版本
pub const PROTOCOL_VERSION: &str = "1.1";

/// 检查间隔（每日一次）
const CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// 兼容性状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Supported,
    Deprecated,
    Unsupported,
    Unreachable,
    Invalid,
}

impl Compatibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compatibility::Supported => "supported",
            Compatibility::Deprecated => "deprecated",
            Compatibility::Unsupported => "unsupported",
            Compatibility::Unreachable => "unreachable",
            Compatibility::Invalid => "invalid",
        }
    }
}

/// 按 `/meta` 元数据对协议版本分类
///
/// 接受两种惯用形态：
/// - `{"protocolVersions": {"1.1": "supported", "1.0": "deprecated"}}`
/// - `{"supportedProtocolVersions": ["1.1"], "deprecatedProtocolVersions": ["1.0"]}`
pub fn classify_compatibility(meta: &Value, protocol_version: &str) -> Compatibility {
    if let Some(map) = meta.get("protocolVersions").and_then(|v| v.as_object()) {
        return match map.get(protocol_version) {
            Some(Value::String(state)) => match state.as_str() {
                "supported" => Compatibility::Supported,
                "deprecated" => Compatibility::Deprecated,
                "unsupported" => Compatibility::Unsupported,
                _ => Compatibility::Invalid,
            },
            Some(_) => Compatibility::Invalid,
            None => Compatibility::Unsupported,
        };
    }

    let in_list = |key: &str| {
        meta.get(key)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().any(|v| v.as_str() == Some(protocol_version)))
    };

    match (
        in_list("supportedProtocolVersions"),
        in_list("deprecatedProtocolVersions"),
    ) {
        (Some(true), _) => Compatibility::Supported,
        (Some(false), Some(true)) => Compatibility::Deprecated,
        (Some(false), _) => Compatibility::Unsupported,
        _ => Compatibility::Invalid,
    }
}

/// 更新检查服务
pub struct UpdateCheckerService {
    relay: Option<Arc<RelayService>>,
    device_repo: DeviceRepository,
    state: RwLock<Compatibility>,
}

impl UpdateCheckerService {
    pub fn new(relay: Option<Arc<RelayService>>, device_repo: DeviceRepository) -> Self {
        Self {
            relay,
            device_repo,
            // Relay 首次检查前按受支持处理
            state: RwLock::new(Compatibility::Supported),
        }
    }

    /// 当前兼容性状态
    pub fn compatibility(&self) -> Compatibility {
        *self.state.read().expect("兼容性状态锁中毒")
    }

    /// 守护循环：启动即检查一次，之后每日一次
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if self.relay.is_none() {
            info!("Relay 未配置，更新检查器不启动");
            return;
        }

        loop {
            self.check_once().await;

            tokio::select! {
                _ = tokio::time::sleep(CHECK_INTERVAL) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("更新检查器已停止");
                        return;
                    }
                }
            }
        }
    }

    async fn check_once(&self) {
        let relay = match &self.relay {
            Some(r) => r.clone(),
            None => return,
        };

        let new_state = match relay.fetch_meta().await {
            Ok(meta) => classify_compatibility(&meta, PROTOCOL_VERSION),
            Err(e) => {
                warn!(error = %e, "Relay /meta 拉取失败");
                Compatibility::Unreachable
            }
        };

        let previous = {
            let mut state = self.state.write().expect("兼容性状态锁中毒");
            let previous = *state;
            *state = new_state;
            previous
        };

        if previous != new_state {
            info!(
                from = previous.as_str(),
                to = new_state.as_str(),
                "兼容性状态变化"
            );
            match new_state {
                Compatibility::Unsupported => {
                    relay.send_server_update_required(&self.device_repo).await;
                }
                Compatibility::Deprecated => {
                    relay.send_server_update_available(&self.device_repo).await;
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_map_form() {
        let meta = json!({"protocolVersions": {"1.1": "supported", "1.0": "deprecated"}});
        assert_eq!(
            classify_compatibility(&meta, "1.1"),
            Compatibility::Supported
        );
        assert_eq!(
            classify_compatibility(&meta, "1.0"),
            Compatibility::Deprecated
        );
        assert_eq!(
            classify_compatibility(&meta, "0.9"),
            Compatibility::Unsupported
        );
    }

    #[test]
    fn test_classify_list_form() {
        let meta = json!({
            "supportedProtocolVersions": ["1.1"],
            "deprecatedProtocolVersions": ["1.0"]
        });
        assert_eq!(
            classify_compatibility(&meta, "1.1"),
            Compatibility::Supported
        );
        assert_eq!(
            classify_compatibility(&meta, "1.0"),
            Compatibility::Deprecated
        );
        assert_eq!(
            classify_compatibility(&meta, "0.9"),
            Compatibility::Unsupported
        );
    }

    #[test]
    fn test_classify_invalid_schema() {
        assert_eq!(
            classify_compatibility(&json!({}), "1.1"),
            Compatibility::Invalid
        );
        assert_eq!(
            classify_compatibility(&json!({"protocolVersions": {"1.1": 3}}), "1.1"),
            Compatibility::Invalid
        );
        assert_eq!(
            classify_compatibility(&json!({"protocolVersions": {"1.1": "weird"}}), "1.1"),
            Compatibility::Invalid
        );
    }
}
