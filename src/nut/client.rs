//! NUT（Network UPS Tools）协议客户端
//!
//! 行式 TCP 文本协议：认证后用 `LIST VAR <ups>` 拉取全量变量。
//! 连接生命周期由调用方控制；轮询器每次尝试都使用全新连接。

use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// 建连超时
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// 单次 `LIST VAR` 的整体读截止
const READ_DEADLINE: Duration = Duration::from_secs(30);

/// NUT 协议错误
#[derive(Debug, thiserror::Error)]
pub enum NutError {
    #[error("连接失败: {0}")]
    ConnectionFailed(String),

    #[error("操作超时")]
    Timeout,

    #[error("认证失败")]
    AuthFailed,

    #[error("UPS 不存在: {0}")]
    UpsNotFound(String),

    #[error("连接已关闭")]
    ChannelClosed,

    #[error("响应格式无效: {0}")]
    InvalidResponse(String),
}

/// NUT 客户端
pub struct NutClient {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    conn: Option<BufReader<TcpStream>>,
    /// 建连进行中的重入保护
    connecting: bool,
}

impl NutClient {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username,
            password,
            conn: None,
            connecting: false,
        }
    }

    /// 是否已连接
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// 建立连接并完成可选认证
    ///
    /// 已有活跃连接时直接复用；建连进行中的二次调用快速失败；
    /// 失败的建连保证客户端回到断开态。
    pub async fn connect(&mut self) -> Result<(), NutError> {
        if self.conn.is_some() {
            return Ok(());
        }
        if self.connecting {
            return Err(NutError::ConnectionFailed(
                "连接正在建立中".to_string(),
            ));
        }

        self.connecting = true;
        let result = self.connect_inner().await;
        self.connecting = false;

        if result.is_err() {
            self.conn = None;
        }
        result
    }

    async fn connect_inner(&mut self) -> Result<(), NutError> {
        let addr = format!("{}:{}", self.host, self.port);

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| NutError::Timeout)?
            .map_err(|e| NutError::ConnectionFailed(e.to_string()))?;

        debug!(addr = %addr, "NUT 连接已建立");
        self.conn = Some(BufReader::new(stream));

        // 可选认证：任何非 OK 前缀都视为认证失败
        if let Some(username) = self.username.clone() {
            self.send_line(&format!("USERNAME {}", username)).await?;
            self.expect_ok().await?;
        }
        if let Some(password) = self.password.clone() {
            self.send_line(&format!("PASSWORD {}", password)).await?;
            self.expect_ok().await?;
        }

        Ok(())
    }

    /// 断开连接（幂等，不报错）
    ///
    /// 同时清除建连进行中标记：被中途丢弃的 connect 经 disconnect 复位。
    pub async fn disconnect(&mut self) {
        self.connecting = false;
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.get_mut().shutdown().await;
            debug!("NUT 连接已断开");
        }
    }

    /// 拉取指定 UPS 的全量变量
    ///
    /// 整个请求受 30 秒读截止约束。
    pub async fn fetch_variables(
        &mut self,
        ups_name: &str,
    ) -> Result<HashMap<String, String>, NutError> {
        tokio::time::timeout(READ_DEADLINE, self.fetch_inner(ups_name))
            .await
            .map_err(|_| NutError::Timeout)?
    }

    async fn fetch_inner(
        &mut self,
        ups_name: &str,
    ) -> Result<HashMap<String, String>, NutError> {
        self.send_line(&format!("LIST VAR {}", ups_name)).await?;

        let mut vars = HashMap::new();
        loop {
            let line = self.read_line().await?;
            let line = line.trim_end();

            if line.starts_with("END LIST VAR") {
                break;
            }
            if line.starts_with("BEGIN LIST VAR") {
                continue;
            }
            if line.starts_with("ERR ") || line == "ERR" {
                if line.contains("UNKNOWN-UPS") {
                    return Err(NutError::UpsNotFound(ups_name.to_string()));
                }
                return Err(NutError::InvalidResponse(line.to_string()));
            }
            if let Some((key, value)) = parse_var_line(line, ups_name) {
                vars.insert(key, value);
            }
            // 其余行（含 UPS 字段不匹配的 VAR 行）静默跳过
        }

        Ok(vars)
    }

    async fn send_line(&mut self, line: &str) -> Result<(), NutError> {
        let conn = self.conn.as_mut().ok_or(NutError::ChannelClosed)?;
        conn.get_mut()
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| NutError::ConnectionFailed(e.to_string()))?;
        conn.get_mut()
            .flush()
            .await
            .map_err(|e| NutError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, NutError> {
        let conn = self.conn.as_mut().ok_or(NutError::ChannelClosed)?;
        let mut line = String::new();
        let n = conn
            .read_line(&mut line)
            .await
            .map_err(|e| NutError::ConnectionFailed(e.to_string()))?;
        if n == 0 {
            return Err(NutError::ChannelClosed);
        }
        Ok(line)
    }

    async fn expect_ok(&mut self) -> Result<(), NutError> {
        let line = self.read_line().await?;
        if line.trim_end().starts_with("OK") {
            Ok(())
        } else {
            Err(NutError::AuthFailed)
        }
    }
}

/// 解析 `VAR <ups> <key> "<value>"` 行
///
/// UPS 字段不匹配或行格式不对时返回 None（静默跳过）。
fn parse_var_line(line: &str, ups_name: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("VAR ")?;
    let (ups, rest) = rest.split_once(' ')?;
    if ups != ups_name {
        return None;
    }
    let (key, rest) = rest.split_once(' ')?;
    let value = rest.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Some((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_line() {
        let parsed = parse_var_line(r#"VAR ups1 battery.charge "87.4""#, "ups1");
        assert_eq!(
            parsed,
            Some(("battery.charge".to_string(), "87.4".to_string()))
        );
    }

    #[test]
    fn test_parse_var_line_other_ups_skipped() {
        assert_eq!(parse_var_line(r#"VAR ups2 ups.load "12""#, "ups1"), None);
    }

    #[test]
    fn test_parse_var_line_unquoted_value() {
        let parsed = parse_var_line("VAR ups1 ups.status OL", "ups1");
        assert_eq!(parsed, Some(("ups.status".to_string(), "OL".to_string())));
    }

    #[test]
    fn test_parse_var_line_malformed() {
        assert_eq!(parse_var_line("VAR ups1", "ups1"), None);
        assert_eq!(parse_var_line("NOTVAR x y z", "ups1"), None);
    }
}
