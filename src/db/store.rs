use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::db::queries;
use crate::models::User;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("User already exists with this email")]
    DuplicateEmail,

    #[error("User {0} not found")]
    NotFound(Uuid),
}

/// 用户存储接口
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: &User) -> Result<(), StoreError>;
    async fn update(&self, user: &User) -> Result<(), StoreError>;
}

/// Postgres 用户存储
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub async fn new(pool: PgPool) -> Result<Self, StoreError> {
        queries::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(queries::get_user(&self.pool, id).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(queries::get_user_by_email(&self.pool, email).await?)
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        Ok(queries::get_user_by_google_id(&self.pool, google_id).await?)
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        queries::insert_user(&self.pool, user).await.map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            _ => StoreError::Database(e),
        })
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        match queries::update_user(&self.pool, user).await? {
            0 => Err(StoreError::NotFound(user.id)),
            _ => Ok(()),
        }
    }
}

/// 内存用户存储 (未配置数据库 / 测试)
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn find_by<F>(&self, pred: F) -> Option<User>
    where
        F: Fn(&User) -> bool,
    {
        self.users
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.find_by(|u| u.email == email))
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.find_by(|u| u.google_id.as_deref() == Some(google_id)))
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        if self.find_by(|u| u.email == user.email).is_some() {
            return Err(StoreError::DuplicateEmail);
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        match self.users.get_mut(&user.id) {
            Some(mut existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(user.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        let first = User::new("Ann@Example.com", "Ann");
        store.insert(&first).await.unwrap();

        let second = User::new("ann@example.com ", "Other Ann");
        let err = store.insert(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn memory_store_finds_by_google_id_after_update() {
        let store = MemoryUserStore::new();
        let mut user = User::new("bob@example.com", "Bob");
        store.insert(&user).await.unwrap();
        assert!(store.find_by_google_id("g-1").await.unwrap().is_none());

        user.google_id = Some("g-1".into());
        store.update(&user).await.unwrap();

        let found = store.find_by_google_id("g-1").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn memory_store_update_requires_existing_user() {
        let store = MemoryUserStore::new();
        let user = User::new("ghost@example.com", "Ghost");
        assert!(matches!(
            store.update(&user).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
