//! NUT 协议模块

mod client;
mod mapper;

pub use client::{NutClient, NutError};
pub use mapper::{derive_status, map_variables};
