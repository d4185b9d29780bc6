use receipt_report::{
    build_router, create_pool,
    db::{MemoryUserStore, PgUserStore, UserStore},
    service::GoogleOAuth,
    AppConfig, AppState, AuthService, GeminiExtractor, ReceiptAnalyzer,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env()?;
    info!("Starting server with config: {:?}", config);
    if config.extraction.api_key.is_empty() {
        warn!("GEMINI_API_KEY is not set, receipt analysis requests will fail");
    }

    // 用户存储: 配置了数据库用 Postgres, 否则用内存
    let store: Arc<dyn UserStore> = match &config.database.url {
        Some(url) => {
            let pool = create_pool(url, config.database.max_connections).await?;
            info!("Database pool created");
            Arc::new(PgUserStore::new(pool).await?)
        }
        None => {
            warn!("DATABASE_URL is not set, using in-memory user store");
            Arc::new(MemoryUserStore::new())
        }
    };

    // 创建服务
    let extractor = Arc::new(GeminiExtractor::new(&config.extraction)?);
    let analyzer = Arc::new(ReceiptAnalyzer::new(
        extractor,
        config.storage.clone(),
        Duration::from_secs(config.extraction.timeout_secs),
    ));
    analyzer.ensure_dirs().await?;
    let auth = Arc::new(AuthService::new(store, &config.auth));
    let oauth = if config.google.is_configured() {
        Some(Arc::new(GoogleOAuth::new(&config.google)?))
    } else {
        info!("Google OAuth not configured, /api/auth/google disabled");
        None
    };

    let app = build_router(AppState {
        analyzer,
        auth,
        oauth,
        client_url: config.server.client_url.clone(),
    });

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Receipt Summarizer server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/analyze-receipt   - 单张小票分析 + PDF");
    info!("  POST /api/analyze-receipts  - 批量小票分析 + 合并 PDF");
    info!("  POST /api/auth/register | /api/auth/login");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
