//! Volteec - 自托管 UPS 监控后端服务
//!
//! NUT 轮询 + SSE 推流 + Relay 推送

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use volteec::{
    config::{Secrets, Settings},
    db::PostgresPool,
    handlers::DegradedMode,
    metrics::Metrics,
    middleware::{RateLimitConfig, RateLimiter, RequestLogger},
    repositories::{DeviceRepository, UpsRepository},
    routes,
    security::{ApiTokenVerifier, DeviceTokenCipher},
    services::{DeviceService, EventBus, PollerService, RelayService, UpdateCheckerService},
    sse::GlobalMetricsLimiter,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 初始化日志
    init_tracing();

    info!("⚡ Volteec 服务启动中...");

    // 加载配置
    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ 配置加载失败: {}", e);
            std::process::exit(1);
        }
    };
    info!("✅ 配置加载完成");

    // 加载机密
    let secrets = match Secrets::load_from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ 机密加载失败: {}", e);
            std::process::exit(1);
        }
    };
    let degraded = secrets.api_token().is_none();

    // 设备令牌加密器
    let cipher = match DeviceTokenCipher::new(secrets.device_token_key().expose_secret()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("❌ 设备令牌密钥无效: {}", e);
            std::process::exit(1);
        }
    };

    // 连接数据库
    let pg_pool = Arc::new(match PostgresPool::new(&settings, &secrets).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ 数据库连接失败: {}", e);
            std::process::exit(1);
        }
    });
    if let Err(e) = pg_pool.run_migrations().await {
        eprintln!("❌ 数据库迁移失败: {}", e);
        std::process::exit(1);
    }
    info!("✅ 数据库连接成功");

    // 初始化仓库
    let ups_repo = UpsRepository::new((*pg_pool).clone());
    let device_repo = DeviceRepository::new((*pg_pool).clone());

    // 运行指标、事件总线、全局 SSE 限流器
    let metrics = Arc::new(Metrics::new());
    let bus = Arc::new(EventBus::new());
    let global_limiter = Arc::new(GlobalMetricsLimiter::new());

    // Relay 推送（配置不完整时降级为关闭）
    let relay: Option<Arc<RelayService>> =
        match (&settings.relay, secrets.relay_tenant_secret()) {
            (Some(relay_settings), Some(secret)) => {
                match RelayService::new(relay_settings.clone(), secret.clone(), metrics.clone())
                {
                    Ok(service) => {
                        info!("✅ Relay 推送已启用");
                        Some(Arc::new(service))
                    }
                    Err(e) => {
                        warn!(error = %e, "Relay 初始化失败，推送功能关闭");
                        None
                    }
                }
            }
            _ => {
                warn!("Relay 未配置，推送功能关闭");
                None
            }
        };

    // 业务服务
    let device_service = Arc::new(DeviceService::new(
        device_repo.clone(),
        cipher,
        relay.as_ref().map(|r| r.server_id()),
    ));
    let update_checker = Arc::new(UpdateCheckerService::new(
        relay.clone(),
        device_repo.clone(),
    ));

    // 后台任务：轮询器 + 更新检查器
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = PollerService::new(
        settings.nut.clone(),
        ups_repo.clone(),
        bus.clone(),
        relay.clone(),
        metrics.clone(),
    );
    let poller_handle = tokio::spawn(poller.run(shutdown_rx.clone()));
    let checker_handle = tokio::spawn(update_checker.clone().run(shutdown_rx.clone()));
    info!("✅ 后台任务已启动");

    // HTTP 层
    let verifier = secrets
        .api_token()
        .map(|t| ApiTokenVerifier::new(t.expose_secret()));
    let rate_limiter = RateLimiter::new(RateLimitConfig::default());
    let production = settings.is_production();

    let server_addr = settings.server_addr();
    let workers = if settings.server.workers == 0 {
        num_cpus::get()
    } else {
        settings.server.workers
    };

    if degraded {
        warn!("⚠️ 降级模式：仅 /health、/ready、/metrics 可用");
    }
    info!("🚀 服务启动在 http://{}", server_addr);
    info!("📊 工作线程数: {}", workers);

    let poll_interval = settings.nut.poll_interval;

    HttpServer::new(move || {
        // 配置 CORS
        let cors = Cors::default()
            .allowed_origin_fn(|origin, _req_head| {
                origin.as_bytes().starts_with(b"http://localhost")
                    || origin.as_bytes().starts_with(b"https://")
            })
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec!["Authorization", "Content-Type", "X-Request-ID"])
            .max_age(3600);

        let auth = verifier.clone().map(volteec::middleware::BearerAuth::new);

        App::new()
            // 全局中间件（最后注册的最先执行）
            .wrap(cors)
            .wrap(RequestLogger::new())
            // 注入服务
            .app_data(web::Data::new(pg_pool.clone()))
            .app_data(web::Data::new(ups_repo.clone()))
            .app_data(web::Data::new(device_service.clone()))
            .app_data(web::Data::new(relay.clone()))
            .app_data(web::Data::new(bus.clone()))
            .app_data(web::Data::new(global_limiter.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .app_data(web::Data::new(update_checker.clone()))
            .app_data(web::Data::new(DegradedMode(degraded)))
            // 配置路由
            .configure(|cfg| routes::configure(cfg, auth, rate_limiter.clone(), production))
    })
    .workers(workers)
    .bind(&server_addr)?
    .run()
    .await?;

    // 协同停机：一个轮询间隔 + 15 秒内完成
    info!("HTTP 服务退出，通知后台任务停机");
    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs_f64(poll_interval) + Duration::from_secs(15);
    let _ = tokio::time::timeout(grace, poller_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), checker_handle).await;

    info!("👋 Volteec 已退出");
    Ok(())
}

/// 初始化日志系统
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,volteec=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
