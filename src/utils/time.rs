//! 时间处理工具

use chrono::{DateTime, Utc};

/// 格式化为 ISO 8601
pub fn format_iso8601(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// 当前 Unix 秒（十进制字符串，用于签名时间戳）
pub fn epoch_seconds_now() -> i64 {
    Utc::now().timestamp()
}
