//! 工具模块

mod time;

pub use time::*;
