use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::api::{extract::AuthUser, AppState};
use crate::error::{AppError, Result};
use crate::models::PublicUser;
use crate::service::{AuthService, AuthSession};

const OAUTH_FAILURE_REDIRECT: &str = "/login?error=oauth_failed";

/// 注册请求体, 缺字段按空处理
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub user: PublicUser,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            success: true,
            token: session.token,
            user: PublicUser::from(&session.user),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

pub async fn register(
    State(auth): State<Arc<AuthService>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let session = auth.register(&req.email, &req.password, &req.name).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

pub async fn login(
    State(auth): State<Arc<AuthService>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let session = auth.login(&req.email, &req.password).await?;
    Ok(Json(session.into()))
}

/// 跳转到 Google 授权页
pub async fn google_login(State(state): State<AppState>) -> Result<Redirect> {
    let oauth = state
        .oauth
        .ok_or_else(|| AppError::BadRequest("Google OAuth is not configured".to_string()))?;
    Ok(Redirect::to(&oauth.authorize_url()))
}

/// Google 回调: 换取资料 -> 关联用户 -> 带令牌跳回前端; 任何失败都跳转登录页
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    match complete_google_login(&state, query).await {
        Ok(token) => {
            let target = format!(
                "{}?token={}&success=true",
                state.client_url,
                urlencoding::encode(&token)
            );
            Redirect::to(&target).into_response()
        }
        Err(e) => {
            error!("Google OAuth error: {}", e);
            Redirect::to(OAUTH_FAILURE_REDIRECT).into_response()
        }
    }
}

async fn complete_google_login(state: &AppState, query: CallbackQuery) -> Result<String> {
    let oauth = state
        .oauth
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Google OAuth is not configured".to_string()))?;
    if let Some(reason) = query.error {
        return Err(AppError::BadRequest(format!("Provider denied access: {}", reason)));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let profile = oauth
        .exchange_code(&code)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let user = state.auth.link_google_profile(&profile).await?;
    info!("Google OAuth callback successful for user: {}", user.email);
    state.auth.issue_token(&user)
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        user: PublicUser::from(&user),
    })
}

/// 令牌无状态, 由客户端丢弃
pub async fn logout(AuthUser(user): AuthUser) -> Json<MessageResponse> {
    info!("User {} logged out", user.email);
    Json(MessageResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    })
}
