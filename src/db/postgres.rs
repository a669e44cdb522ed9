//! PostgreSQL 连接池管理

use crate::config::{DatabaseTlsMode, Secrets, Settings};
use crate::errors::AppError;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::time::Duration;

/// PostgreSQL 连接池包装
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// 创建新的数据库连接池
    pub async fn new(settings: &Settings, secrets: &Secrets) -> Result<Self, AppError> {
        let db = &settings.database;

        let ssl_mode = match db.tls_mode {
            DatabaseTlsMode::Require => PgSslMode::Require,
            DatabaseTlsMode::Prefer => PgSslMode::Prefer,
            DatabaseTlsMode::Disable => PgSslMode::Disable,
        };

        let options = PgConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .username(&db.username)
            .password(secrets.database_password().expose_secret())
            .database(&db.name)
            .ssl_mode(ssl_mode);

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "数据库连接失败");
                AppError::DatabaseError(e)
            })?;

        tracing::info!("数据库连接池已创建");

        Ok(Self { pool })
    }

    /// 获取内部连接池引用
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(AppError::DatabaseError)
    }

    /// 运行数据库迁移
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::InternalError(format!("迁移失败: {}", e)))
    }
}
