//! 数据模型模块

mod device;
mod ups;

pub use device::*;
pub use ups::*;
