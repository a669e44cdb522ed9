//! 配置模块

mod settings;

pub use settings::{
    DatabaseSettings, DatabaseTlsMode, NutSettings, RelaySettings, Secrets, ServerSettings,
    Settings,
};
