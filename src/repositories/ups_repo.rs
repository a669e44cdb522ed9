//! UPS 快照仓库
//!
//! UPS 表的唯一写入口。轮询器之外的组件只读。

use crate::db::PostgresPool;
use crate::errors::AppError;
use crate::models::{Ups, UpsSnapshot, UpsStatus};

/// 连续失败晋升离线的阈值
pub const OFFLINE_FAILURE_THRESHOLD: i32 = 3;

/// 失败登记结果
#[derive(Debug, Clone)]
pub struct FailureOutcome {
    pub ups: Ups,
    /// 登记前的状态
    pub previous_status: UpsStatus,
    /// 本次登记是否把状态翻转为离线
    pub status_changed: bool,
}

/// UPS 快照仓库
#[derive(Clone)]
pub struct UpsRepository {
    pool: PostgresPool,
}

impl UpsRepository {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// 写入成功轮询的快照
    ///
    /// 已有行被整体覆盖并把 consecutive_failures 归零；不存在则插入。
    /// 返回新行与更新前的状态（新插入时为 None）。
    pub async fn upsert(
        &self,
        snapshot: &UpsSnapshot,
    ) -> Result<(Ups, Option<UpsStatus>), AppError> {
        let mut tx = self.pool.pool().begin().await?;

        let previous: Option<UpsStatus> =
            sqlx::query_scalar("SELECT status FROM ups WHERE ups_id = $1 FOR UPDATE")
                .bind(&snapshot.ups_id)
                .fetch_optional(&mut *tx)
                .await?;

        let ups = sqlx::query_as::<_, Ups>(
            r#"
            INSERT INTO ups (
                ups_id, data_source, status, ups_status_raw,
                battery_percent, runtime_minutes, battery_runtime_seconds, load_percent,
                input_voltage, output_voltage,
                battery_charge_low, battery_charge_warning, battery_runtime_low,
                battery_voltage, battery_voltage_nominal, battery_type, battery_date, battery_mfr_date,
                device_mfr, device_model, device_serial, device_type,
                driver_name, driver_version, driver_version_internal, driver_version_data,
                driver_poll_freq, driver_poll_interval,
                input_voltage_nominal, input_sensitivity, input_transfer_low, input_transfer_high,
                output_voltage_nominal,
                ups_beeper_status, ups_delay_shutdown, ups_delay_start,
                ups_timer_shutdown, ups_timer_start, ups_timer_reboot,
                ups_firmware, ups_firmware_aux, ups_mfr, ups_model, ups_serial,
                ups_vendorid, ups_productid, ups_realpower_nominal, ups_test_result,
                consecutive_failures, created_at, updated_at
            )
            VALUES (
                $1, 'nut', $2, $3,
                $4, $5, $6, $7,
                $8, $9,
                $10, $11, $12,
                $13, $14, $15, $16, $17,
                $18, $19, $20, $21,
                $22, $23, $24, $25,
                $26, $27,
                $28, $29, $30, $31,
                $32,
                $33, $34, $35,
                $36, $37, $38,
                $39, $40, $41, $42, $43,
                $44, $45, $46, $47,
                0, NOW(), NOW()
            )
            ON CONFLICT (ups_id) DO UPDATE SET
                status = EXCLUDED.status,
                ups_status_raw = EXCLUDED.ups_status_raw,
                battery_percent = EXCLUDED.battery_percent,
                runtime_minutes = EXCLUDED.runtime_minutes,
                battery_runtime_seconds = EXCLUDED.battery_runtime_seconds,
                load_percent = EXCLUDED.load_percent,
                input_voltage = EXCLUDED.input_voltage,
                output_voltage = EXCLUDED.output_voltage,
                battery_charge_low = EXCLUDED.battery_charge_low,
                battery_charge_warning = EXCLUDED.battery_charge_warning,
                battery_runtime_low = EXCLUDED.battery_runtime_low,
                battery_voltage = EXCLUDED.battery_voltage,
                battery_voltage_nominal = EXCLUDED.battery_voltage_nominal,
                battery_type = EXCLUDED.battery_type,
                battery_date = EXCLUDED.battery_date,
                battery_mfr_date = EXCLUDED.battery_mfr_date,
                device_mfr = EXCLUDED.device_mfr,
                device_model = EXCLUDED.device_model,
                device_serial = EXCLUDED.device_serial,
                device_type = EXCLUDED.device_type,
                driver_name = EXCLUDED.driver_name,
                driver_version = EXCLUDED.driver_version,
                driver_version_internal = EXCLUDED.driver_version_internal,
                driver_version_data = EXCLUDED.driver_version_data,
                driver_poll_freq = EXCLUDED.driver_poll_freq,
                driver_poll_interval = EXCLUDED.driver_poll_interval,
                input_voltage_nominal = EXCLUDED.input_voltage_nominal,
                input_sensitivity = EXCLUDED.input_sensitivity,
                input_transfer_low = EXCLUDED.input_transfer_low,
                input_transfer_high = EXCLUDED.input_transfer_high,
                output_voltage_nominal = EXCLUDED.output_voltage_nominal,
                ups_beeper_status = EXCLUDED.ups_beeper_status,
                ups_delay_shutdown = EXCLUDED.ups_delay_shutdown,
                ups_delay_start = EXCLUDED.ups_delay_start,
                ups_timer_shutdown = EXCLUDED.ups_timer_shutdown,
                ups_timer_start = EXCLUDED.ups_timer_start,
                ups_timer_reboot = EXCLUDED.ups_timer_reboot,
                ups_firmware = EXCLUDED.ups_firmware,
                ups_firmware_aux = EXCLUDED.ups_firmware_aux,
                ups_mfr = EXCLUDED.ups_mfr,
                ups_model = EXCLUDED.ups_model,
                ups_serial = EXCLUDED.ups_serial,
                ups_vendorid = EXCLUDED.ups_vendorid,
                ups_productid = EXCLUDED.ups_productid,
                ups_realpower_nominal = EXCLUDED.ups_realpower_nominal,
                ups_test_result = EXCLUDED.ups_test_result,
                consecutive_failures = 0,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&snapshot.ups_id)
        .bind(snapshot.status)
        .bind(&snapshot.ups_status_raw)
        .bind(snapshot.battery_percent)
        .bind(snapshot.runtime_minutes)
        .bind(snapshot.battery_runtime_seconds)
        .bind(snapshot.load_percent)
        .bind(snapshot.input_voltage)
        .bind(snapshot.output_voltage)
        .bind(snapshot.battery_charge_low)
        .bind(snapshot.battery_charge_warning)
        .bind(snapshot.battery_runtime_low)
        .bind(snapshot.battery_voltage)
        .bind(snapshot.battery_voltage_nominal)
        .bind(&snapshot.battery_type)
        .bind(&snapshot.battery_date)
        .bind(&snapshot.battery_mfr_date)
        .bind(&snapshot.device_mfr)
        .bind(&snapshot.device_model)
        .bind(&snapshot.device_serial)
        .bind(&snapshot.device_type)
        .bind(&snapshot.driver_name)
        .bind(&snapshot.driver_version)
        .bind(&snapshot.driver_version_internal)
        .bind(&snapshot.driver_version_data)
        .bind(snapshot.driver_poll_freq)
        .bind(snapshot.driver_poll_interval)
        .bind(snapshot.input_voltage_nominal)
        .bind(&snapshot.input_sensitivity)
        .bind(snapshot.input_transfer_low)
        .bind(snapshot.input_transfer_high)
        .bind(snapshot.output_voltage_nominal)
        .bind(&snapshot.ups_beeper_status)
        .bind(snapshot.ups_delay_shutdown)
        .bind(snapshot.ups_delay_start)
        .bind(snapshot.ups_timer_shutdown)
        .bind(snapshot.ups_timer_start)
        .bind(snapshot.ups_timer_reboot)
        .bind(&snapshot.ups_firmware)
        .bind(&snapshot.ups_firmware_aux)
        .bind(&snapshot.ups_mfr)
        .bind(&snapshot.ups_model)
        .bind(&snapshot.ups_serial)
        .bind(&snapshot.ups_vendorid)
        .bind(&snapshot.ups_productid)
        .bind(snapshot.ups_realpower_nominal)
        .bind(&snapshot.ups_test_result)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((ups, previous))
    }

    /// 登记一次轮询失败
    ///
    /// 行不存在（从未成功轮询过）时返回 None。连续失败数达到阈值且尚未
    /// 离线时，把状态置为 ups_offline 并清空全部指标/识别/驱动/计时字段。
    pub async fn register_failure(
        &self,
        ups_id: &str,
    ) -> Result<Option<FailureOutcome>, AppError> {
        let mut tx = self.pool.pool().begin().await?;

        let current = sqlx::query_as::<_, Ups>("SELECT * FROM ups WHERE ups_id = $1 FOR UPDATE")
            .bind(ups_id)
            .fetch_optional(&mut *tx)
            .await?;

        let current = match current {
            Some(row) => row,
            None => return Ok(None),
        };

        let previous_status = current.status;
        let failures = current.consecutive_failures + 1;
        let promote = failures >= OFFLINE_FAILURE_THRESHOLD
            && current.status != UpsStatus::UpsOffline;

        let ups = if promote {
            sqlx::query_as::<_, Ups>(
                r#"
                UPDATE ups SET
                    status = 'ups_offline',
                    ups_status_raw = NULL,
                    battery_percent = NULL,
                    runtime_minutes = NULL,
                    battery_runtime_seconds = NULL,
                    load_percent = NULL,
                    input_voltage = NULL,
                    output_voltage = NULL,
                    battery_charge_low = NULL,
                    battery_charge_warning = NULL,
                    battery_runtime_low = NULL,
                    battery_voltage = NULL,
                    battery_voltage_nominal = NULL,
                    battery_type = NULL,
                    battery_date = NULL,
                    battery_mfr_date = NULL,
                    device_mfr = NULL,
                    device_model = NULL,
                    device_serial = NULL,
                    device_type = NULL,
                    driver_name = NULL,
                    driver_version = NULL,
                    driver_version_internal = NULL,
                    driver_version_data = NULL,
                    driver_poll_freq = NULL,
                    driver_poll_interval = NULL,
                    input_voltage_nominal = NULL,
                    input_sensitivity = NULL,
                    input_transfer_low = NULL,
                    input_transfer_high = NULL,
                    output_voltage_nominal = NULL,
                    ups_beeper_status = NULL,
                    ups_delay_shutdown = NULL,
                    ups_delay_start = NULL,
                    ups_timer_shutdown = NULL,
                    ups_timer_start = NULL,
                    ups_timer_reboot = NULL,
                    ups_firmware = NULL,
                    ups_firmware_aux = NULL,
                    ups_mfr = NULL,
                    ups_model = NULL,
                    ups_serial = NULL,
                    ups_vendorid = NULL,
                    ups_productid = NULL,
                    ups_realpower_nominal = NULL,
                    ups_test_result = NULL,
                    consecutive_failures = $2,
                    updated_at = NOW()
                WHERE ups_id = $1
                RETURNING *
                "#,
            )
            .bind(ups_id)
            .bind(failures)
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as::<_, Ups>(
                "UPDATE ups SET consecutive_failures = $2, updated_at = NOW() WHERE ups_id = $1 RETURNING *",
            )
            .bind(ups_id)
            .bind(failures)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;

        Ok(Some(FailureOutcome {
            ups,
            previous_status,
            status_changed: promote,
        }))
    }

    /// 查询全部 UPS（按 ups_id 排序）
    pub async fn find_all(&self) -> Result<Vec<Ups>, AppError> {
        let rows = sqlx::query_as::<_, Ups>("SELECT * FROM ups ORDER BY ups_id")
            .fetch_all(self.pool.pool())
            .await?;
        Ok(rows)
    }

    /// 根据 ups_id 查询
    pub async fn find_by_id(&self, ups_id: &str) -> Result<Option<Ups>, AppError> {
        let row = sqlx::query_as::<_, Ups>("SELECT * FROM ups WHERE ups_id = $1")
            .bind(ups_id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(row)
    }
}
