//! 设备注册仓库

use crate::db::PostgresPool;
use crate::errors::AppError;
use crate::models::{Device, DeviceEnvironment};
use uuid::Uuid;

/// 幂等写入需要的全部字段
#[derive(Debug, Clone)]
pub struct DeviceUpsertParams {
    pub ups_id: String,
    pub ups_alias: Option<String>,
    /// AES-GCM 密文（base64）
    pub device_token_encrypted: String,
    /// 明文令牌的 SHA-256 摘要（十六进制）
    pub token_hash: String,
    pub installation_id: Option<Uuid>,
    pub server_id: Option<Uuid>,
    pub ups_hidden: bool,
    pub environment: DeviceEnvironment,
}

/// 设备注册仓库
#[derive(Clone)]
pub struct DeviceRepository {
    pool: PostgresPool,
}

impl DeviceRepository {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// 幂等注册
    ///
    /// 逻辑键 (token_hash, ups_id, environment, server_id, installation_id)：
    /// 命中则覆盖别名/隐藏位/密文，否则插入。返回 (行, 是否新建)。
    pub async fn upsert(&self, params: &DeviceUpsertParams) -> Result<(Device, bool), AppError> {
        let mut tx = self.pool.pool().begin().await?;

        let existing = sqlx::query_as::<_, Device>(
            r#"
            SELECT * FROM devices
            WHERE token_hash = $1
              AND ups_id = $2
              AND environment = $3
              AND server_id IS NOT DISTINCT FROM $4
              AND installation_id IS NOT DISTINCT FROM $5
            FOR UPDATE
            "#,
        )
        .bind(&params.token_hash)
        .bind(&params.ups_id)
        .bind(params.environment)
        .bind(params.server_id)
        .bind(params.installation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (device, created) = match existing {
            Some(row) => {
                let device = sqlx::query_as::<_, Device>(
                    r#"
                    UPDATE devices
                    SET ups_alias = $2,
                        device_token = $3,
                        ups_hidden = $4
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(row.id)
                .bind(&params.ups_alias)
                .bind(&params.device_token_encrypted)
                .bind(params.ups_hidden)
                .fetch_one(&mut *tx)
                .await?;
                (device, false)
            }
            None => {
                let device = sqlx::query_as::<_, Device>(
                    r#"
                    INSERT INTO devices (
                        id, ups_id, ups_alias, device_token, token_hash,
                        installation_id, server_id, ups_hidden, environment, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&params.ups_id)
                .bind(&params.ups_alias)
                .bind(&params.device_token_encrypted)
                .bind(&params.token_hash)
                .bind(params.installation_id)
                .bind(params.server_id)
                .bind(params.ups_hidden)
                .bind(params.environment)
                .fetch_one(&mut *tx)
                .await?;
                (device, true)
            }
        };

        tx.commit().await?;
        Ok((device, created))
    }

    /// 幂等注销：删除匹配行，返回删除数（0 也算成功）
    pub async fn delete(
        &self,
        token_hash: &str,
        ups_id: &str,
        environment: DeviceEnvironment,
        installation_id: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM devices
            WHERE token_hash = $1
              AND ups_id = $2
              AND environment = $3
              AND ($4::uuid IS NULL OR installation_id IS NOT DISTINCT FROM $4)
            "#,
        )
        .bind(token_hash)
        .bind(ups_id)
        .bind(environment)
        .bind(installation_id)
        .execute(self.pool.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// 本地注册设备总数（Relay 广播前的快速短路判断）
    pub async fn count_all(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices")
            .fetch_one(self.pool.pool())
            .await?;
        Ok(count)
    }

    /// 针对某 UPS 的可见注册（命中复合索引 ups_id/environment/server_id/ups_hidden）
    pub async fn find_visible_for_ups(
        &self,
        ups_id: &str,
        environment: DeviceEnvironment,
        server_id: Option<Uuid>,
    ) -> Result<Vec<Device>, AppError> {
        let rows = sqlx::query_as::<_, Device>(
            r#"
            SELECT * FROM devices
            WHERE ups_id = $1
              AND environment = $2
              AND server_id IS NOT DISTINCT FROM $3
              AND ups_hidden = FALSE
            ORDER BY created_at
            "#,
        )
        .bind(ups_id)
        .bind(environment)
        .bind(server_id)
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows)
    }
}
