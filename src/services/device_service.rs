//! 设备注册业务逻辑

use crate::errors::AppError;
use crate::models::{Device, DeviceEnvironment, RegisterDeviceRequest, UnregisterDeviceRequest};
use crate::repositories::{DeviceRepository, DeviceUpsertParams};
use crate::security::{sha256_hex, DeviceTokenCipher};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 受支持的 API 版本
const SUPPORTED_API_VERSIONS: [&str; 2] = ["1.0", "1.1"];

/// 校验请求中的 apiVersion：出现且非空时必须是受支持版本
pub fn validate_api_version(api_version: Option<&str>) -> Result<(), AppError> {
    match api_version {
        None => Ok(()),
        Some(v) if v.is_empty() => Ok(()),
        Some(v) if SUPPORTED_API_VERSIONS.contains(&v) => Ok(()),
        Some(v) => Err(AppError::ValidationError(format!(
            "不支持的 apiVersion: {}",
            v
        ))),
    }
}

/// 单个推送目标（解密校验通过的可见注册）
#[derive(Debug, Clone)]
pub struct PushTarget {
    pub installation_id: Option<Uuid>,
}

/// 设备注册服务
pub struct DeviceService {
    device_repo: DeviceRepository,
    cipher: Arc<DeviceTokenCipher>,
    /// 本服务器 ID（Relay 已配置时写入注册行）
    server_id: Option<Uuid>,
}

impl DeviceService {
    pub fn new(
        device_repo: DeviceRepository,
        cipher: Arc<DeviceTokenCipher>,
        server_id: Option<Uuid>,
    ) -> Self {
        Self {
            device_repo,
            cipher,
            server_id,
        }
    }

    /// 幂等注册：返回 (行, 是否新建)
    pub async fn register(
        &self,
        request: &RegisterDeviceRequest,
    ) -> Result<(Device, bool), AppError> {
        validate_api_version(request.api_version.as_deref())?;

        let ups_id = request.ups_id.trim().to_lowercase();
        if ups_id.is_empty() {
            return Err(AppError::ValidationError("upsId 不能为空".to_string()));
        }

        // 别名 trim 后为空视为未提供
        let ups_alias = request
            .ups_alias
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let params = DeviceUpsertParams {
            ups_id: ups_id.clone(),
            ups_alias,
            device_token_encrypted: self.cipher.encrypt(&request.device_token)?,
            token_hash: sha256_hex(&request.device_token),
            installation_id: request.installation_id,
            server_id: self.server_id,
            ups_hidden: request.ups_hidden.unwrap_or(false),
            environment: request.environment.unwrap_or_default(),
        };

        let (device, created) = self.device_repo.upsert(&params).await?;
        info!(
            ups_id = %ups_id,
            created = created,
            environment = device.environment.as_str(),
            "设备注册完成"
        );
        Ok((device, created))
    }

    /// 幂等注销：目标行不存在同样成功
    pub async fn unregister(&self, request: &UnregisterDeviceRequest) -> Result<u64, AppError> {
        validate_api_version(request.api_version.as_deref())?;

        let ups_id = request.ups_id.trim().to_lowercase();
        let token_hash = sha256_hex(&request.device_token);
        let environment = request.environment.unwrap_or_default();

        let removed = self
            .device_repo
            .delete(&token_hash, &ups_id, environment, request.installation_id)
            .await?;

        info!(ups_id = %ups_id, removed = removed, "设备注销完成");
        Ok(removed)
    }

    /// 列出某 UPS 的推送目标
    ///
    /// 只返回未隐藏、且令牌密文能解开的注册；解不开的行按"未找到"
    /// 处理（跳过，不报错）。
    pub async fn push_targets(
        &self,
        ups_id: &str,
        environment: DeviceEnvironment,
    ) -> Result<Vec<PushTarget>, AppError> {
        let ups_id = ups_id.trim().to_lowercase();
        let devices = self
            .device_repo
            .find_visible_for_ups(&ups_id, environment, self.server_id)
            .await?;

        let total = devices.len();
        let targets: Vec<PushTarget> = devices
            .iter()
            .filter(|device| self.decrypt_token(device).is_some())
            .map(|device| PushTarget {
                installation_id: device.installation_id,
            })
            .collect();

        if targets.len() < total {
            info!(
                ups_id = %ups_id,
                skipped = total - targets.len(),
                "部分注册的令牌密文无法解开，已按未找到跳过"
            );
        }
        Ok(targets)
    }

    /// 解密注册行中的设备令牌；解密失败按"未找到"处理
    fn decrypt_token(&self, device: &Device) -> Option<String> {
        self.cipher.decrypt(&device.device_token)
    }
}
