//! Storage for accounts, tokens, permissions and the versioned resources.
//!
//! Every repository is a trait with a `PostgreSQL` implementation and an
//! in-memory one ([`memory::InMemoryStore`]) used by tests and local runs.
//!
//! ## Tables
//!
//! - `users` - Accounts (unique email, Argon2id password digest)
//! - `permissions` / `users_permissions` - Permission codes and grants
//! - `tokens` - SHA-256 digests of activation tokens
//! - `products`, `orders`, `invoices` - Versioned resources
//! - `tower_sessions.session` - Session storage (created by the session store)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p paperback-cli -- migrate
//! ```

pub mod invoices;
pub mod memory;
pub mod orders;
pub mod permissions;
pub mod products;
pub mod tokens;
pub mod users;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::ServerConfig;

pub use invoices::{InvoiceFilter, InvoiceRepository, PgInvoiceRepository};
pub use memory::InMemoryStore;
pub use orders::{OrderFilter, OrderRepository, PgOrderRepository};
pub use permissions::{PermissionRepository, PgPermissionRepository};
pub use products::{PgProductRepository, ProductFilter, ProductRepository};
pub use tokens::{PgTokenRepository, TokenRecord, TokenRepository};
pub use users::{NewUserRecord, PgUserRepository, UserRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// The stored version no longer matches the caller's.
    #[error("edit conflict")]
    EditConflict,

    /// A unique constraint rejected the value of `field`.
    #[error("duplicate value for {field}")]
    Duplicate { field: &'static str },

    /// A foreign key named by `field` points at nothing.
    #[error("unknown reference in {field}")]
    MissingReference { field: &'static str },

    /// The operation did not finish within its deadline.
    #[error("operation timed out")]
    Timeout,
}

/// Create a `PostgreSQL` connection pool from configuration.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &ServerConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(config.database_url.expose_secret())
        .await
}

/// Runs a storage operation under a deadline.
pub(crate) async fn with_timeout<T, F>(limit: Duration, op: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    tokio::time::timeout(limit, op)
        .await
        .map_err(|_| RepositoryError::Timeout)?
}

/// Maps constraint violations to typed errors; anything else stays a database error.
pub(crate) fn map_constraint(e: sqlx::Error, field: &'static str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return RepositoryError::Duplicate { field };
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::MissingReference { field };
        }
    }
    RepositoryError::Database(e)
}

/// Reachability check for the backing store.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), RepositoryError>;
}

pub struct PgHealth {
    pool: PgPool,
    timeout: Duration,
}

#[async_trait]
impl StoreHealth for PgHealth {
    async fn ping(&self) -> Result<(), RepositoryError> {
        with_timeout(self.timeout, async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }
}

/// Every repository the server uses, behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub health: Arc<dyn StoreHealth>,
}

impl Repositories {
    /// `PostgreSQL`-backed repositories sharing one pool.
    #[must_use]
    pub fn postgres(pool: PgPool, timeout: Duration) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone(), timeout)),
            tokens: Arc::new(PgTokenRepository::new(pool.clone(), timeout)),
            permissions: Arc::new(PgPermissionRepository::new(pool.clone(), timeout)),
            products: Arc::new(PgProductRepository::new(pool.clone(), timeout)),
            orders: Arc::new(PgOrderRepository::new(pool.clone(), timeout)),
            invoices: Arc::new(PgInvoiceRepository::new(pool.clone(), timeout)),
            health: Arc::new(PgHealth { pool, timeout }),
        }
    }

    /// Repositories backed by a shared in-memory store.
    #[must_use]
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            tokens: store.clone(),
            permissions: store.clone(),
            products: store.clone(),
            orders: store.clone(),
            invoices: store.clone(),
            health: store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, RepositoryError>(7) }).await;
        assert!(matches!(ok, Ok(7)));

        let err = with_timeout(Duration::from_secs(1), async {
            Err::<(), _>(RepositoryError::NotFound)
        })
        .await;
        assert!(matches!(err, Err(RepositoryError::NotFound)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let slow = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, RepositoryError>(())
        })
        .await;
        assert!(matches!(slow, Err(RepositoryError::Timeout)));
    }

    #[test]
    fn test_non_constraint_errors_stay_database_errors() {
        let err = map_constraint(sqlx::Error::RowNotFound, "email");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
