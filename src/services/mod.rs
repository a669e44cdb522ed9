//! 业务逻辑层（Service）

mod device_service;
mod event_bus;
mod poller_service;
mod relay_service;
mod update_service;

pub use device_service::{validate_api_version, DeviceService, PushTarget};
pub use event_bus::{EventBus, EventType, SubscriberLimitExceeded, UpsEvent, MAX_SUBSCRIBERS};
pub use poller_service::PollerService;
pub use relay_service::{sign_relay_request, RelayService};
pub use update_service::{
    classify_compatibility, Compatibility, UpdateCheckerService, PROTOCOL_VERSION,
};
