//! Invoice repository.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use paperback_core::domain::Created;
use paperback_core::{
    Filters, Invoice, InvoiceId, InvoiceSort, InvoiceStatus, Metadata, NewInvoice, OrderId,
};

use super::products::{CreatedRow, created};
use super::{RepositoryError, map_constraint, with_timeout};

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub order_id: Option<OrderId>,
    pub status: Option<InvoiceStatus>,
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn list(
        &self,
        filter: &InvoiceFilter,
        filters: &Filters<InvoiceSort>,
    ) -> Result<(Vec<Invoice>, Metadata), RepositoryError>;

    async fn get(&self, id: InvoiceId) -> Result<Invoice, RepositoryError>;

    /// Fails with `MissingReference { field: "order_id" }` for an unknown order.
    async fn insert(&self, invoice: &NewInvoice) -> Result<Created<InvoiceId>, RepositoryError>;

    async fn update(&self, invoice: &Invoice) -> Result<i32, RepositoryError>;

    async fn delete(&self, id: InvoiceId) -> Result<(), RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: InvoiceId,
    order_id: OrderId,
    created_at: DateTime<Utc>,
    status: String,
    version: i32,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = RepositoryError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid invoice status in database: {e}"))
        })?;
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            created_at: row.created_at,
            status,
            version: row.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CountedInvoiceRow {
    total: i64,
    #[sqlx(flatten)]
    invoice: InvoiceRow,
}

/// `PostgreSQL` invoice repository.
pub struct PgInvoiceRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgInvoiceRepository {
    #[must_use]
    pub const fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    async fn list(
        &self,
        filter: &InvoiceFilter,
        filters: &Filters<InvoiceSort>,
    ) -> Result<(Vec<Invoice>, Metadata), RepositoryError> {
        let query = format!(
            r"
            SELECT count(*) OVER() AS total, id, order_id, created_at, status, version
            FROM invoices
            WHERE ($1::bigint IS NULL OR order_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY {}
            LIMIT $3 OFFSET $4
            ",
            filters.order_by()
        );

        with_timeout(self.timeout, async {
            let rows = sqlx::query_as::<_, CountedInvoiceRow>(&query)
                .bind(filter.order_id)
                .bind(filter.status)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?;

            let total = rows.first().map_or(0, |r| r.total);
            let invoices = rows
                .into_iter()
                .map(|r| Invoice::try_from(r.invoice))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((invoices, Metadata::for_filters(total, filters)))
        })
        .await
    }

    async fn get(&self, id: InvoiceId) -> Result<Invoice, RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        with_timeout(self.timeout, async {
            sqlx::query_as::<_, InvoiceRow>(
                r"
                SELECT id, order_id, created_at, status, version
                FROM invoices
                WHERE id = $1
                ",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .try_into()
        })
        .await
    }

    async fn insert(&self, invoice: &NewInvoice) -> Result<Created<InvoiceId>, RepositoryError> {
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, CreatedRow<InvoiceId>>(
                r"
                INSERT INTO invoices (order_id, status)
                VALUES ($1, $2)
                RETURNING id, created_at, version
                ",
            )
            .bind(invoice.order_id)
            .bind(invoice.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_constraint(e, "order_id"))?;
            Ok(created(row))
        })
        .await
    }

    async fn update(&self, invoice: &Invoice) -> Result<i32, RepositoryError> {
        with_timeout(self.timeout, async {
            let version: Option<i32> = sqlx::query_scalar(
                r"
                UPDATE invoices
                SET order_id = $1, status = $2, version = version + 1
                WHERE id = $3 AND version = $4
                RETURNING version
                ",
            )
            .bind(invoice.order_id)
            .bind(invoice.status)
            .bind(invoice.id)
            .bind(invoice.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_constraint(e, "order_id"))?;
            version.ok_or(RepositoryError::EditConflict)
        })
        .await
    }

    async fn delete(&self, id: InvoiceId) -> Result<(), RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        with_timeout(self.timeout, async {
            let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
                .bind(id)
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
