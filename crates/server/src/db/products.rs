//! Product catalog repository.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use paperback_core::domain::Created;
use paperback_core::{Filters, Metadata, NewProduct, Product, ProductId, ProductSort};

use super::{RepositoryError, with_timeout};

/// List filter. An empty title matches everything.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub title: String,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(
        &self,
        filter: &ProductFilter,
        filters: &Filters<ProductSort>,
    ) -> Result<(Vec<Product>, Metadata), RepositoryError>;

    async fn get(&self, id: ProductId) -> Result<Product, RepositoryError>;

    async fn insert(&self, product: &NewProduct) -> Result<Created<ProductId>, RepositoryError>;

    /// Writes `product` if its `version` still matches; returns the new version.
    async fn update(&self, product: &Product) -> Result<i32, RepositoryError>;

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    created_at: DateTime<Utc>,
    title: String,
    description: String,
    price: i32,
    version: i32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            title: row.title,
            description: row.description,
            price: row.price,
            version: row.version,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CountedProductRow {
    total: i64,
    #[sqlx(flatten)]
    product: ProductRow,
}

/// `RETURNING id, created_at, version` of an insert.
pub(super) type CreatedRow<Id> = (Id, DateTime<Utc>, i32);

pub(super) fn created<Id>((id, created_at, version): CreatedRow<Id>) -> Created<Id> {
    Created {
        id,
        created_at,
        version,
    }
}

/// `PostgreSQL` product repository.
pub struct PgProductRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgProductRepository {
    #[must_use]
    pub const fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn list(
        &self,
        filter: &ProductFilter,
        filters: &Filters<ProductSort>,
    ) -> Result<(Vec<Product>, Metadata), RepositoryError> {
        // The ORDER BY body comes from a closed enum, never from request text.
        let query = format!(
            r"
            SELECT count(*) OVER() AS total, id, created_at, title, description, price, version
            FROM products
            WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
            ORDER BY {}
            LIMIT $2 OFFSET $3
            ",
            filters.order_by()
        );

        with_timeout(self.timeout, async {
            let rows = sqlx::query_as::<_, CountedProductRow>(&query)
                .bind(&filter.title)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?;

            let total = rows.first().map_or(0, |r| r.total);
            let products = rows.into_iter().map(|r| r.product.into()).collect();
            Ok((products, Metadata::for_filters(total, filters)))
        })
        .await
    }

    async fn get(&self, id: ProductId) -> Result<Product, RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, ProductRow>(
                r"
                SELECT id, created_at, title, description, price, version
                FROM products
                WHERE id = $1
                ",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(Product::from).ok_or(RepositoryError::NotFound)
        })
        .await
    }

    async fn insert(&self, product: &NewProduct) -> Result<Created<ProductId>, RepositoryError> {
        with_timeout(self.timeout, async {
            let row = sqlx::query_as::<_, CreatedRow<ProductId>>(
                r"
                INSERT INTO products (title, description, price)
                VALUES ($1, $2, $3)
                RETURNING id, created_at, version
                ",
            )
            .bind(&product.title)
            .bind(&product.description)
            .bind(product.price)
            .fetch_one(&self.pool)
            .await?;
            Ok(created(row))
        })
        .await
    }

    async fn update(&self, product: &Product) -> Result<i32, RepositoryError> {
        with_timeout(self.timeout, async {
            let version: Option<i32> = sqlx::query_scalar(
                r"
                UPDATE products
                SET title = $1, description = $2, price = $3, version = version + 1
                WHERE id = $4 AND version = $5
                RETURNING version
                ",
            )
            .bind(&product.title)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.id)
            .bind(product.version)
            .fetch_optional(&self.pool)
            .await?;
            version.ok_or(RepositoryError::EditConflict)
        })
        .await
    }

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        if !id.is_positive() {
            return Err(RepositoryError::NotFound);
        }
        with_timeout(self.timeout, async {
            let result = sqlx::query("DELETE FROM products WHERE id = $1")
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
