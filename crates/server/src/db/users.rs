//! Account repository.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use paperback_core::{Email, User, UserId};

use super::{RepositoryError, map_constraint, with_timeout};

/// Fields for a new, unactivated account.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts an unactivated account at version 1.
    ///
    /// Fails with `Duplicate { field: "email" }` when the email is taken.
    async fn insert(&self, user: &NewUserRecord) -> Result<User, RepositoryError>;

    /// Non-positive ids are `NotFound` without touching storage.
    async fn get_by_id(&self, id: UserId) -> Result<User, RepositoryError>;

    async fn get_by_email(&self, email: &Email) -> Result<User, RepositoryError>;

    /// Writes every mutable field if `user.version` still matches, returning
    /// the new version.
    async fn update(&self, user: &User) -> Result<i32, RepositoryError>;
}

#[derive(sqlx::FromRow)]
pub(super) struct UserRow {
    id: UserId,
    created_at: DateTime<Utc>,
    name: String,
    email: String,
    password_hash: String,
    activated: bool,
    version: i32,
}

impl UserRow {
    pub(super) fn into_user(self) -> Result<User, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(User {
            id: self.id,
            created_at: self.created_at,
            name: self.name,
            email,
            password_hash: self.password_hash,
            activated: self.activated,
            version: self.version,
        })
    }
}

/// `PostgreSQL` account repository.
pub struct PgUserRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserRepository {
    #[must_use]
    pub const fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &NewUserRecord) -> Result<User, RepositoryError> {
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, UserRow>(
                r"
                INSERT INTO users (name, email, password_hash, activated)
                VALUES ($1, $2, $3, FALSE)
                RETURNING id, created_at, name, email, password_hash, activated, version
                ",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_constraint(e, "email"))?;
            row.into_user()
        })
        .await
    }

    async fn get_by_id(&self, id: UserId) -> Result<User, RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        with_timeout(self.timeout, async {
            sqlx::query_as::<_, UserRow>(
                r"
                SELECT id, created_at, name, email, password_hash, activated, version
                FROM users
                WHERE id = $1
                ",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .into_user()
        })
        .await
    }

    async fn get_by_email(&self, email: &Email) -> Result<User, RepositoryError> {
        with_timeout(self.timeout, async {
            sqlx::query_as::<_, UserRow>(
                r"
                SELECT id, created_at, name, email, password_hash, activated, version
                FROM users
                WHERE email = $1::citext
                ",
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .into_user()
        })
        .await
    }

    async fn update(&self, user: &User) -> Result<i32, RepositoryError> {
        with_timeout(self.timeout, async {
            let version: Option<i32> = sqlx::query_scalar(
                r"
                UPDATE users
                SET name = $1, email = $2, password_hash = $3, activated = $4,
                    version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                ",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_constraint(e, "email"))?;
            version.ok_or(RepositoryError::EditConflict)
        })
        .await
    }
}
