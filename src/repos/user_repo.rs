/*
 * Responsibility
 * - users テーブル向け SQLx 操作
 * - UserStore trait (handler / service はこの trait だけを見る)
 * - DB エラーは RepoError に変換して返す
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};
use uuid::Uuid;

use crate::repos::error::RepoError;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    #[sqlx(rename = "userId")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    #[sqlx(rename = "passwordHash")]
    pub password_hash: String,
    #[sqlx(rename = "dateCreated")]
    pub date_created: DateTime<Utc>,
    #[sqlx(rename = "dateUpdated")]
    pub date_updated: DateTime<Utc>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &User) -> Result<(), RepoError>;
    /// Replace every mutable column of an existing user.
    async fn update(&self, user: &User) -> Result<(), RepoError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;
    /// `page` starts at 1.
    async fn query(&self, page: u32, rows_per_page: u32) -> Result<Vec<User>, RepoError>;
    async fn query_by_id(&self, id: Uuid) -> Result<User, RepoError>;
    async fn query_by_email(&self, email: &str) -> Result<User, RepoError>;
    /// Readiness probe.
    async fn check(&self) -> Result<(), RepoError>;
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool and bring the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RepoError::Db(e.into()))?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &User) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO users
                ("userId", "name", "email", "roles", "passwordHash", "dateCreated", "dateUpdated")
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.roles)
        .bind(&user.password_hash)
        .bind(user.date_created)
        .bind(user.date_updated)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET
                "name" = $2,
                "email" = $3,
                "roles" = $4,
                "passwordHash" = $5,
                "dateUpdated" = $6
            WHERE "userId" = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.roles)
        .bind(&user.password_hash)
        .bind(user.date_updated)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE "userId" = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn query(&self, page: u32, rows_per_page: u32) -> Result<Vec<User>, RepoError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(rows_per_page);

        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT "userId", "name", "email", "roles", "passwordHash", "dateCreated", "dateUpdated"
            FROM users
            ORDER BY "dateCreated", "userId"
            OFFSET $1 ROWS FETCH NEXT $2 ROWS ONLY
            "#,
        )
        .bind(offset)
        .bind(i64::from(rows_per_page))
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(rows)
    }

    async fn query_by_id(&self, id: Uuid) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT "userId", "name", "email", "roles", "passwordHash", "dateCreated", "dateUpdated"
            FROM users
            WHERE "userId" = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn query_by_email(&self, email: &str) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT "userId", "name", "email", "roles", "passwordHash", "dateCreated", "dateUpdated"
            FROM users
            WHERE "email" = $1
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)
    }

    async fn check(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT true").execute(&self.pool).await?;
        Ok(())
    }
}
