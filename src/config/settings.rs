//! 应用配置加载和管理
//!
//! 全部配置来自环境变量（容器部署约定）。机密值不进入普通配置结构，
//! 单独经 [`Secrets`] 用 `SecretString` 包裹。

use crate::errors::AppError;
use config::{Config, Environment};
use secrecy::SecretString;
use serde::Deserialize;
use std::env;
use url::Url;
use uuid::Uuid;

/// 生产环境 Relay 基地址
const RELAY_PRODUCTION_URL: &str = "https://relay.volteec.com";
/// 预发/开发环境 Relay 基地址
const RELAY_STAGING_URL: &str = "https://relay-staging.volteec.com";

/// 环境变量的平面视图（反序列化中转）
#[derive(Debug, Clone, Deserialize)]
struct RawEnv {
    #[serde(default = "default_server_host")]
    server_host: String,
    #[serde(default = "default_server_port")]
    server_port: u16,
    #[serde(default)]
    server_workers: usize,

    database_host: String,
    #[serde(default = "default_database_port")]
    database_port: u16,
    database_username: String,
    database_name: String,
    #[serde(default = "default_tls_mode")]
    database_tls_mode: String,

    nut_host: String,
    #[serde(default = "default_nut_port")]
    nut_port: u16,
    /// 逗号分隔的 UPS 名称列表
    nut_ups: String,
    #[serde(default)]
    nut_username: Option<String>,
    #[serde(default)]
    nut_password: Option<String>,
    #[serde(default = "default_poll_interval")]
    nut_poll_interval: f64,

    #[serde(default)]
    relay_tenant_id: Option<String>,
    #[serde(default)]
    relay_server_id: Option<String>,
    #[serde(default)]
    relay_url: Option<String>,

    #[serde(default = "default_deployment")]
    volteec_deployment: String,
    #[serde(default = "default_environment")]
    environment: String,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    8080
}
fn default_database_port() -> u16 {
    5432
}
fn default_tls_mode() -> String {
    "prefer".to_string()
}
fn default_nut_port() -> u16 {
    3493
}
fn default_poll_interval() -> f64 {
    1.0
}
fn default_deployment() -> String {
    "staging".to_string()
}
fn default_environment() -> String {
    "development".to_string()
}

/// 数据库 TLS 模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseTlsMode {
    Require,
    Prefer,
    Disable,
}

impl DatabaseTlsMode {
    fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "require" => Ok(Self::Require),
            "prefer" => Ok(Self::Prefer),
            "disable" => Ok(Self::Disable),
            other => Err(AppError::ConfigError(format!(
                "DATABASE_TLS_MODE 取值无效: {}（应为 require/prefer/disable）",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub name: String,
    pub tls_mode: DatabaseTlsMode,
}

#[derive(Debug, Clone)]
pub struct NutSettings {
    pub host: String,
    pub port: u16,
    /// 受监控的 UPS 名称列表（已小写、去空白）
    pub ups_names: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 轮询间隔（秒）
    pub poll_interval: f64,
}

/// Relay 推送配置（校验通过才会存在）
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub base_url: Url,
    pub tenant_id: Uuid,
    pub server_id: Uuid,
    /// 推送事件携带的环境标记：sandbox / production
    pub environment: String,
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub nut: NutSettings,
    pub relay: Option<RelaySettings>,
    /// 部署环境标记（production 时关闭 simulate-push 等调试端点）
    pub environment: String,
}

impl Settings {
    /// 从环境变量加载配置
    pub fn load() -> Result<Self, AppError> {
        let raw: RawEnv = Config::builder()
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;

        let ups_names: Vec<String> = raw
            .nut_ups
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if ups_names.is_empty() {
            return Err(AppError::ConfigError(
                "NUT_UPS 未配置任何 UPS 名称".to_string(),
            ));
        }
        if raw.nut_poll_interval <= 0.0 {
            return Err(AppError::ConfigError(
                "NUT_POLL_INTERVAL 必须为正数".to_string(),
            ));
        }

        let relay = Self::build_relay(&raw);

        Ok(Self {
            server: ServerSettings {
                host: raw.server_host,
                port: raw.server_port,
                workers: raw.server_workers,
            },
            database: DatabaseSettings {
                host: raw.database_host,
                port: raw.database_port,
                username: raw.database_username,
                name: raw.database_name,
                tls_mode: DatabaseTlsMode::parse(&raw.database_tls_mode)?,
            },
            nut: NutSettings {
                host: raw.nut_host,
                port: raw.nut_port,
                ups_names,
                username: raw.nut_username.filter(|s| !s.is_empty()),
                password: raw.nut_password.filter(|s| !s.is_empty()),
                poll_interval: raw.nut_poll_interval,
            },
            relay,
            environment: raw.environment,
        })
    }

    /// 组装 Relay 配置；不完整或非法时警告并返回 None（推送被禁用，服务继续）
    fn build_relay(raw: &RawEnv) -> Option<RelaySettings> {
        let any_set = raw.relay_tenant_id.is_some()
            || raw.relay_server_id.is_some()
            || env::var("RELAY_TENANT_SECRET").is_ok();
        let all_set = raw.relay_tenant_id.is_some() && raw.relay_server_id.is_some();
        if any_set && !all_set {
            tracing::warn!("Relay 配置不完整（需要 RELAY_TENANT_ID/SECRET/SERVER_ID），推送已禁用");
        }

        let tenant_id = raw.relay_tenant_id.as_deref()?;
        let server_id = raw.relay_server_id.as_deref()?;
        if env::var("RELAY_TENANT_SECRET").map(|s| s.is_empty()).unwrap_or(true) {
            tracing::warn!("RELAY_TENANT_SECRET 未设置，Relay 推送已禁用");
            return None;
        }

        let tenant_id = match Uuid::parse_str(tenant_id) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "RELAY_TENANT_ID 不是合法 UUID，Relay 推送已禁用");
                return None;
            }
        };
        let server_id = match Uuid::parse_str(server_id) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "RELAY_SERVER_ID 不是合法 UUID，Relay 推送已禁用");
                return None;
            }
        };

        let is_production = raw.volteec_deployment == "production";
        let default_url = if is_production {
            RELAY_PRODUCTION_URL
        } else {
            RELAY_STAGING_URL
        };
        let base_url = raw.relay_url.as_deref().unwrap_or(default_url);
        let base_url = match Url::parse(base_url) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(error = %e, url = %base_url, "Relay 基地址无法解析，Relay 推送已禁用");
                return None;
            }
        };

        Some(RelaySettings {
            base_url,
            tenant_id,
            server_id,
            environment: if is_production {
                "production".to_string()
            } else {
                "sandbox".to_string()
            },
        })
    }

    /// 获取服务器地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为生产部署
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// 应用机密集合
///
/// `API_TOKEN` 缺失不是致命错误：服务进入降级模式（只挂载 /health、/ready、
/// /metrics）。其余机密缺失在各自的初始化点报错。
pub struct Secrets {
    api_token: Option<SecretString>,
    device_token_key: SecretString,
    database_password: SecretString,
    relay_tenant_secret: Option<SecretString>,
}

impl Secrets {
    /// 从环境变量加载机密
    pub fn load_from_env() -> Result<Self, AppError> {
        let api_token = env::var("API_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::new);
        if api_token.is_none() {
            tracing::warn!("API_TOKEN 未设置：进入降级模式，/v1/* 路由不挂载");
        }

        Ok(Self {
            api_token,
            device_token_key: SecretString::new(env::var("DEVICE_TOKEN_KEY").map_err(|_| {
                AppError::ConfigError("DEVICE_TOKEN_KEY 未设置".to_string())
            })?),
            database_password: SecretString::new(env::var("DATABASE_PASSWORD").map_err(
                |_| AppError::ConfigError("DATABASE_PASSWORD 未设置".to_string()),
            )?),
            relay_tenant_secret: env::var("RELAY_TENANT_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .map(SecretString::new),
        })
    }

    /// API 访问令牌（None 表示降级模式）
    pub fn api_token(&self) -> Option<&SecretString> {
        self.api_token.as_ref()
    }

    /// 设备令牌加密密钥（base64，32 字节）
    pub fn device_token_key(&self) -> &SecretString {
        &self.device_token_key
    }

    /// 数据库密码
    pub fn database_password(&self) -> &SecretString {
        &self.database_password
    }

    /// Relay 租户签名密钥
    pub fn relay_tenant_secret(&self) -> Option<&SecretString> {
        self.relay_tenant_secret.as_ref()
    }
}
