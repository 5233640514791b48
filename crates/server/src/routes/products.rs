//! Product catalog handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

use paperback_core::{
    Filters, PageQuery, Product, ProductId, ProductInput, ProductPatch, ProductSort,
};

use super::extract::{JsonBody, PathId, QueryParams};
use crate::db::ProductFilter;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub title: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

/// `GET /products`
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Value>> {
    let filters = Filters::<ProductSort>::parse(&query.page)?;
    let filter = ProductFilter {
        title: query.title.unwrap_or_default(),
    };

    let (products, metadata) = state.repos().products.list(&filter, &filters).await?;
    Ok(Json(json!({ "products": products, "metadata": metadata })))
}

/// `POST /products`
pub async fn create(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ProductInput>,
) -> Result<impl IntoResponse> {
    let new = input.validate()?;
    let created = state.repos().products.insert(&new).await?;

    let product = Product {
        id: created.id,
        created_at: created.created_at,
        title: new.title,
        description: new.description,
        price: new.price,
        version: created.version,
    };
    tracing::info!(product_id = %product.id, "Product created");

    Ok((
        StatusCode::CREATED,
        [(LOCATION, format!("/products/{}", product.id))],
        Json(json!({ "product": product })),
    ))
}

/// `GET /products/{id}`
pub async fn show(State(state): State<AppState>, PathId(id): PathId) -> Result<Json<Value>> {
    let product = state.repos().products.get(ProductId::new(id)).await?;
    Ok(Json(json!({ "product": product })))
}

/// `PATCH /products/{id}`
pub async fn update(
    State(state): State<AppState>,
    PathId(id): PathId,
    JsonBody(patch): JsonBody<ProductPatch>,
) -> Result<Json<Value>> {
    let current = state.repos().products.get(ProductId::new(id)).await?;
    let mut product = patch.apply(&current)?;
    product.version = state.repos().products.update(&product).await?;
    Ok(Json(json!({ "product": product })))
}

/// `DELETE /products/{id}`
pub async fn delete(State(state): State<AppState>, PathId(id): PathId) -> Result<Json<Value>> {
    state.repos().products.delete(ProductId::new(id)).await?;
    Ok(Json(json!({ "message": "product successfully deleted" })))
}
