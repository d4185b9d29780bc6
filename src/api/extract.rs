use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Multipart},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::User;
use crate::service::{AuthService, UploadedImage};

/// 已登录用户 (Authorization: Bearer <jwt>)
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("No token, authorization denied".to_string()))?;

        let auth = Arc::<AuthService>::from_ref(state);
        let user = auth.current_user(token).await.map_err(|e| match e {
            AppError::Unauthorized(_) => AppError::Unauthorized("Token is not valid".to_string()),
            other => other,
        })?;
        Ok(AuthUser(user))
    }
}

/// 读取指定字段名的全部文件, 超过 `max_files` 直接拒绝
pub async fn read_images(
    multipart: &mut Multipart,
    field_name: &str,
    max_files: usize,
) -> Result<Vec<UploadedImage>> {
    let mut images = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        if images.len() == max_files {
            return Err(AppError::BadRequest(format!(
                "Too many files: at most {} receipts per batch",
                max_files
            )));
        }
        let filename = field.file_name().unwrap_or("receipt").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;
        images.push(UploadedImage {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Ok(images)
}
