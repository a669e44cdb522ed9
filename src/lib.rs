//! Volteec - 自托管 UPS 监控后端
//!
//! 通过 NUT 协议轮询 UPS 设备，支持：
//! - 快照持久化与 REST 查询
//! - SSE 实时推流（限流 + 心跳 + 惰性断连检测）
//! - 状态迁移经 Relay 推送到 iOS 客户端
//! - 设备令牌加密注册

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod nut;
pub mod repositories;
pub mod routes;
pub mod security;
pub mod services;
pub mod sse;
pub mod utils;

pub use errors::AppError;
