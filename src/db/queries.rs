use crate::models::User;
use sqlx::PgPool;
use uuid::Uuid;

/// 建表 (启动时执行, 已存在则跳过)
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id            UUID PRIMARY KEY,
            email         VARCHAR(320) NOT NULL UNIQUE,
            password_hash TEXT,
            name          VARCHAR(200) NOT NULL,
            google_id     VARCHAR(64) UNIQUE,
            avatar        TEXT,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// 按ID查询用户
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password_hash, name, google_id, avatar, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// 按邮箱查询用户
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password_hash, name, google_id, avatar, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

/// 按 Google 账号查询用户
pub async fn get_user_by_google_id(
    pool: &PgPool,
    google_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password_hash, name, google_id, avatar, created_at
        FROM users
        WHERE google_id = $1
        "#,
    )
    .bind(google_id)
    .fetch_optional(pool)
    .await
}

/// 新增用户
pub async fn insert_user(pool: &PgPool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, google_id, avatar, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.name)
    .bind(&user.google_id)
    .bind(&user.avatar)
    .bind(user.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// 更新可变字段 (密码 / Google 关联 / 头像)
pub async fn update_user(pool: &PgPool, user: &User) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $2,
            name = $3,
            google_id = $4,
            avatar = $5
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(&user.password_hash)
    .bind(&user.name)
    .bind(&user.google_id)
    .bind(&user.avatar)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
