use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::{StoreError, UserStore};
use crate::error::{AppError, Result};
use crate::models::user::normalize_email;
use crate::models::User;
use crate::service::oauth::GoogleProfile;

/// JWT 载荷
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: Uuid,
    iat: i64,
    exp: i64,
}

/// 登录 / 注册成功后的会话
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// 账号服务: 注册、登录、Google 账号关联、令牌签发与校验
pub struct AuthService {
    store: Arc<dyn UserStore>,
    jwt_secret: String,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, cfg: &AuthConfig) -> Self {
        Self {
            store,
            jwt_secret: cfg.jwt_secret.clone(),
            token_ttl: Duration::days(cfg.token_ttl_days),
            bcrypt_cost: cfg.bcrypt_cost,
        }
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<AuthSession> {
        if email.trim().is_empty() || password.is_empty() || name.trim().is_empty() {
            return Err(AppError::BadRequest("All fields are required".to_string()));
        }
        if self.store.find_by_email(&normalize_email(email)).await?.is_some() {
            return Err(duplicate_email());
        }

        let mut user = User::new(email, name);
        user.password_hash = Some(self.hash_password(password).await?);
        match self.store.insert(&user).await {
            Ok(()) => {}
            Err(StoreError::DuplicateEmail) => return Err(duplicate_email()),
            Err(e) => return Err(e.into()),
        }

        info!("Registered user {} ({})", user.email, user.id);
        let token = self.issue_token(&user)?;
        Ok(AuthSession { token, user })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::BadRequest(
                "Email and password are required".to_string(),
            ));
        }

        let user = self
            .store
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid_credentials)?;
        let hash = user.password_hash.clone().ok_or_else(|| {
            AppError::BadRequest("Please use Google Sign-In for this account".to_string())
        })?;

        if !verify_password(password.to_string(), hash).await? {
            warn!("Failed login for {}", user.email);
            return Err(invalid_credentials());
        }

        let token = self.issue_token(&user)?;
        Ok(AuthSession { token, user })
    }

    /// Google 资料 -> 本地用户: 先按 google_id, 再按邮箱关联, 都没有则新建
    pub async fn link_google_profile(&self, profile: &GoogleProfile) -> Result<User> {
        if let Some(user) = self.store.find_by_google_id(&profile.id).await? {
            return Ok(user);
        }

        let email = normalize_email(&profile.email);
        if let Some(mut user) = self.store.find_by_email(&email).await? {
            user.google_id = Some(profile.id.clone());
            if profile.picture.is_some() {
                user.avatar = profile.picture.clone();
            }
            self.store.update(&user).await?;
            info!("Linked Google account to {}", user.email);
            return Ok(user);
        }

        let mut user = User::new(&email, &profile.name);
        user.google_id = Some(profile.id.clone());
        user.avatar = profile.picture.clone();
        self.store.insert(&user).await?;
        info!("Created user {} from Google sign-in", user.email);
        Ok(user)
    }

    pub fn issue_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
    }

    /// 校验令牌, 返回用户 ID
    pub fn verify_token(&self, token: &str) -> Result<Uuid> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims.user_id)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))
    }

    pub async fn current_user(&self, token: &str) -> Result<User> {
        let id = self.verify_token(token)?;
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))
    }

    async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(format!("Password check failed: {}", e)))
}

fn duplicate_email() -> AppError {
    AppError::BadRequest(StoreError::DuplicateEmail.to_string())
}

fn invalid_credentials() -> AppError {
    AppError::BadRequest("Invalid credentials".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserStore;

    fn service() -> AuthService {
        let cfg = AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_days: 7,
            bcrypt_cost: 4,
        };
        AuthService::new(Arc::new(MemoryUserStore::new()), &cfg)
    }

    fn profile(id: &str, email: &str) -> GoogleProfile {
        GoogleProfile {
            id: id.to_string(),
            email: email.to_string(),
            name: "Gina".to_string(),
            picture: Some("https://example.com/a.png".to_string()),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let auth = service();
        let session = auth
            .register(" Ann@Example.com ", "secret", "Ann")
            .await
            .unwrap();
        assert_eq!(session.user.email, "ann@example.com");
        assert_eq!(auth.verify_token(&session.token).unwrap(), session.user.id);

        let again = auth.login("ann@example.com", "secret").await.unwrap();
        assert_eq!(again.user.id, session.user.id);
    }

    #[tokio::test]
    async fn register_rejects_missing_fields_and_duplicates() {
        let auth = service();
        let err = auth.register("a@b.c", "", "A").await.unwrap_err();
        assert_eq!(err.to_string(), "All fields are required");

        auth.register("a@b.c", "pw", "A").await.unwrap();
        let err = auth.register("A@B.C", "pw", "A").await.unwrap_err();
        assert_eq!(err.to_string(), "User already exists with this email");
    }

    #[tokio::test]
    async fn login_failures() {
        let auth = service();
        auth.register("a@b.c", "pw", "A").await.unwrap();

        let err = auth.login("", "pw").await.unwrap_err();
        assert_eq!(err.to_string(), "Email and password are required");
        let err = auth.login("a@b.c", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
        let err = auth.login("nobody@b.c", "pw").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn google_only_account_cannot_use_password() {
        let auth = service();
        auth.link_google_profile(&profile("g-1", "g@b.c")).await.unwrap();
        let err = auth.login("g@b.c", "pw").await.unwrap_err();
        assert_eq!(err.to_string(), "Please use Google Sign-In for this account");
    }

    #[tokio::test]
    async fn google_profile_links_existing_email() {
        let auth = service();
        let session = auth.register("g@b.c", "pw", "G").await.unwrap();

        let linked = auth.link_google_profile(&profile("g-1", "G@B.C")).await.unwrap();
        assert_eq!(linked.id, session.user.id);
        assert_eq!(linked.google_id.as_deref(), Some("g-1"));
        assert!(linked.avatar.is_some());

        // 再次登录按 google_id 命中
        let again = auth.link_google_profile(&profile("g-1", "other@b.c")).await.unwrap();
        assert_eq!(again.id, session.user.id);
        // 原密码仍可用
        auth.login("g@b.c", "pw").await.unwrap();
    }

    #[tokio::test]
    async fn current_user_requires_valid_token() {
        let auth = service();
        let session = auth.register("a@b.c", "pw", "A").await.unwrap();
        assert_eq!(auth.current_user(&session.token).await.unwrap().id, session.user.id);

        assert!(matches!(
            auth.current_user("not-a-token").await,
            Err(AppError::Unauthorized(_))
        ));

        let stranger = User::new("x@y.z", "X");
        let token = auth.issue_token(&stranger).unwrap();
        assert!(matches!(
            auth.current_user(&token).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
