//! Permission grants.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use paperback_core::{PermissionCode, Permissions, UserId};

use super::{RepositoryError, with_timeout};

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Every code granted to `user_id`. Unknown users have none.
    async fn all_for_user(&self, user_id: UserId) -> Result<Permissions, RepositoryError>;

    /// Grants `codes`. Codes already held are left alone.
    async fn add_for_user(
        &self,
        user_id: UserId,
        codes: &[PermissionCode],
    ) -> Result<(), RepositoryError>;
}

/// `PostgreSQL` permission repository.
pub struct PgPermissionRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgPermissionRepository {
    #[must_use]
    pub const fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
    async fn all_for_user(&self, user_id: UserId) -> Result<Permissions, RepositoryError> {
        with_timeout(self.timeout, async {
            let codes: Vec<String> = sqlx::query_scalar(
                r"
                SELECT permissions.code
                FROM permissions
                INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
                WHERE users_permissions.user_id = $1
                ORDER BY permissions.code
                ",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(Permissions::new(codes))
        })
        .await
    }

    async fn add_for_user(
        &self,
        user_id: UserId,
        codes: &[PermissionCode],
    ) -> Result<(), RepositoryError> {
        let codes: Vec<&str> = codes.iter().map(PermissionCode::as_str).collect();
        with_timeout(self.timeout, async {
            sqlx::query(
                r"
                INSERT INTO users_permissions (user_id, permission_id)
                SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(user_id)
            .bind(&codes)
            .execute(&self.pool)
            .await
            .map_err(|e| super::map_constraint(e, "user_id"))?;
            Ok(())
        })
        .await
    }
}
