use async_trait::async_trait;
use libris_authz::Role;
use libris_db::{observe, StoreError};
use sqlx::PgPool;
use time::OffsetDateTime;

use super::models::{NewUser, User};

const COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Whether a live user already holds `username` or `email`.
    async fn exists(&self, username: &str, email: &str) -> Result<bool, StoreError>;

    async fn insert(&self, user: &NewUser) -> Result<User, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|err: anyhow::Error| StoreError::from(sqlx::Error::Decode(err.into())))?;
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE username = $1 AND deleted_at IS NULL");
        let row = observe(
            "select",
            "users",
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(username)
                .fetch_optional(&self.pool),
        )
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row = observe(
            "select",
            "users",
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn exists(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        observe(
            "select",
            "users",
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM users \
                 WHERE deleted_at IS NULL AND (username = $1 OR email = $2))",
            )
            .bind(username)
            .bind(email)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        );
        let row = observe(
            "insert",
            "users",
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .fetch_one(&self.pool),
        )
        .await?;
        User::try_from(row)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        observe(
            "count",
            "users",
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
                .fetch_one(&self.pool),
        )
        .await
    }
}
