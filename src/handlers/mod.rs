//! API 处理器层（Handler）

mod device_handler;
mod health_handler;
mod relay_handler;
mod status_handler;
mod ups_handler;

pub use device_handler::{register_device, unregister_device};
pub use health_handler::{health, metrics, ready, DegradedMode};
pub use relay_handler::{create_pair, simulate_push, SimulatePushRequest};
pub use status_handler::server_status;
pub use ups_handler::{get_ups_status, list_ups};
