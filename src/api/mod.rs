pub mod auth;
pub mod extract;
pub mod handlers;
pub mod routes;

use axum::extract::FromRef;
use std::sync::Arc;

use crate::service::{AuthService, GoogleOAuth, ReceiptAnalyzer};

pub use extract::AuthUser;
pub use routes::build_router;

/// 共享状态: 分析服务 + 账号服务 (+ 可选的 Google 登录)
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<ReceiptAnalyzer>,
    pub auth: Arc<AuthService>,
    pub oauth: Option<Arc<GoogleOAuth>>,
    /// OAuth 成功后跳转的前端地址
    pub client_url: String,
}

impl FromRef<AppState> for Arc<ReceiptAnalyzer> {
    fn from_ref(state: &AppState) -> Self {
        state.analyzer.clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
