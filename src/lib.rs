pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod service;

pub use api::{build_router, AppState};
pub use config::AppConfig;
pub use db::create_pool;
pub use error::AppError;
pub use service::{AuthService, GeminiExtractor, ReceiptAnalyzer};
