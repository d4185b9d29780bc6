use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// 用户表 (users)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // Google 登录用户无密码
    pub name: String,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash: None,
            name: name.trim().to_string(),
            google_id: None,
            avatar: None,
            created_at: Utc::now(),
        }
    }
}

/// 邮箱统一去空格并转小写
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 返回给前端的用户信息
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}
