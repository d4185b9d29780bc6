use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;

use crate::api::{auth, handlers, AppState};

/// multipart 边界和表单字段的余量
const MULTIPART_SLACK: usize = 1024 * 1024;

/// 组装全部路由
pub fn build_router(state: AppState) -> Router {
    let storage = state.analyzer.storage();
    let body_limit = storage.max_file_bytes * storage.max_batch_files + MULTIPART_SLACK;

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/google", get(auth::google_login))
        .route("/google/callback", get(auth::google_callback))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let receipt_routes = Router::new()
        .route("/api/analyze-receipt", post(handlers::analyze_receipt))
        .route("/api/analyze-receipts", post(handlers::analyze_receipts))
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(body_limit)));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/uploads/:name", get(handlers::serve_upload))
        .route("/pdfs/:name", get(handlers::serve_pdf))
        .nest("/api/auth", auth_routes)
        .merge(receipt_routes)
        .with_state(state)
}
