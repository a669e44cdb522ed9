//! 数据仓库层（Repository）

mod device_repo;
mod ups_repo;

pub use device_repo::{DeviceRepository, DeviceUpsertParams};
pub use ups_repo::{FailureOutcome, UpsRepository, OFFLINE_FAILURE_THRESHOLD};
