//! Owner-scoped order repository.
//!
//! Every statement carries the owner's id in its predicate, so another
//! account's order looks exactly like a missing one.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use paperback_core::domain::Created;
use paperback_core::{Filters, Metadata, NewOrder, Order, OrderId, OrderSort, OrderStatus, UserId};

use super::products::{CreatedRow, created};
use super::{RepositoryError, with_timeout};

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn list(
        &self,
        owner: UserId,
        filter: &OrderFilter,
        filters: &Filters<OrderSort>,
    ) -> Result<(Vec<Order>, Metadata), RepositoryError>;

    async fn get(&self, owner: UserId, id: OrderId) -> Result<Order, RepositoryError>;

    async fn insert(
        &self,
        owner: UserId,
        order: &NewOrder,
    ) -> Result<Created<OrderId>, RepositoryError>;

    /// Writes `order` if it still belongs to `order.user_id` at `order.version`.
    async fn update(&self, order: &Order) -> Result<i32, RepositoryError>;

    async fn delete(&self, owner: UserId, id: OrderId) -> Result<(), RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    created_at: DateTime<Utc>,
    user_id: UserId,
    total_price: i32,
    status: String,
    version: i32,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order status in database: {e}"))
        })?;
        Ok(Self {
            id: row.id,
            created_at: row.created_at,
            user_id: row.user_id,
            total_price: row.total_price,
            status,
            version: row.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CountedOrderRow {
    total: i64,
    #[sqlx(flatten)]
    order: OrderRow,
}

/// `PostgreSQL` order repository.
pub struct PgOrderRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgOrderRepository {
    #[must_use]
    pub const fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn list(
        &self,
        owner: UserId,
        filter: &OrderFilter,
        filters: &Filters<OrderSort>,
    ) -> Result<(Vec<Order>, Metadata), RepositoryError> {
        let query = format!(
            r"
            SELECT count(*) OVER() AS total, id, created_at, user_id, total_price, status, version
            FROM orders
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY {}
            LIMIT $3 OFFSET $4
            ",
            filters.order_by()
        );

        with_timeout(self.timeout, async {
            let rows = sqlx::query_as::<_, CountedOrderRow>(&query)
                .bind(owner)
                .bind(filter.status)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?;

            let total = rows.first().map_or(0, |r| r.total);
            let orders = rows
                .into_iter()
                .map(|r| Order::try_from(r.order))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((orders, Metadata::for_filters(total, filters)))
        })
        .await
    }

    async fn get(&self, owner: UserId, id: OrderId) -> Result<Order, RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        with_timeout(self.timeout, async {
            sqlx::query_as::<_, OrderRow>(
                r"
                SELECT id, created_at, user_id, total_price, status, version
                FROM orders
                WHERE id = $1 AND user_id = $2
                ",
            )
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .try_into()
        })
        .await
    }

    async fn insert(
        &self,
        owner: UserId,
        order: &NewOrder,
    ) -> Result<Created<OrderId>, RepositoryError> {
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, CreatedRow<OrderId>>(
                r"
                INSERT INTO orders (user_id, total_price, status)
                VALUES ($1, $2, $3)
                RETURNING id, created_at, version
                ",
            )
            .bind(owner)
            .bind(order.total_price)
            .bind(order.status)
            .fetch_one(&self.pool)
            .await?;
            Ok(created(row))
        })
        .await
    }

    async fn update(&self, order: &Order) -> Result<i32, RepositoryError> {
        with_timeout(self.timeout, async {
            let version: Option<i32> = sqlx::query_scalar(
                r"
                UPDATE orders
                SET total_price = $1, status = $2, version = version + 1
                WHERE id = $3 AND user_id = $4 AND version = $5
                RETURNING version
                ",
            )
            .bind(order.total_price)
            .bind(order.status)
            .bind(order.id)
            .bind(order.user_id)
            .bind(order.version)
            .fetch_optional(&self.pool)
            .await?;
            version.ok_or(RepositoryError::EditConflict)
        })
        .await
    }

    async fn delete(&self, owner: UserId, id: OrderId) -> Result<(), RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        with_timeout(self.timeout, async {
            let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
            Ok(())
        })
        .await
    }
}
