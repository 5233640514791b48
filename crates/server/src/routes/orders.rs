//! Order handlers. Every operation is scoped to the signed-in user.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

use paperback_core::{
    Filters, Order, OrderId, OrderInput, OrderPatch, OrderSort, OrderStatus, PageQuery,
    ValidationErrors,
};

use super::extract::{JsonBody, PathId, QueryParams};
use crate::db::OrderFilter;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

/// `GET /orders`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Value>> {
    let mut errors = ValidationErrors::new();
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<OrderStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                errors.add("status", e.to_string());
                None
            }
        },
    };
    let filters = match Filters::<OrderSort>::parse(&query.page) {
        Ok(filters) => Some(filters),
        Err(e) => {
            errors.merge(e);
            None
        }
    };
    errors.into_result()?;
    let filters = filters.unwrap_or_default();

    let (orders, metadata) = state
        .repos()
        .orders
        .list(owner.id, &OrderFilter { status }, &filters)
        .await?;
    Ok(Json(json!({ "orders": orders, "metadata": metadata })))
}

/// `POST /orders`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    JsonBody(input): JsonBody<OrderInput>,
) -> Result<impl IntoResponse> {
    let new = input.validate()?;
    let created = state.repos().orders.insert(owner.id, &new).await?;

    let order = Order {
        id: created.id,
        created_at: created.created_at,
        user_id: owner.id,
        total_price: new.total_price,
        status: new.status,
        version: created.version,
    };

    Ok((
        StatusCode::CREATED,
        [(LOCATION, format!("/orders/{}", order.id))],
        Json(json!({ "order": order })),
    ))
}

/// `GET /orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    PathId(id): PathId,
) -> Result<Json<Value>> {
    let order = state.repos().orders.get(owner.id, OrderId::new(id)).await?;
    Ok(Json(json!({ "order": order })))
}

/// `PATCH /orders/{id}`
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    PathId(id): PathId,
    JsonBody(patch): JsonBody<OrderPatch>,
) -> Result<Json<Value>> {
    let current = state.repos().orders.get(owner.id, OrderId::new(id)).await?;
    let mut order = patch.apply(&current)?;
    order.version = state.repos().orders.update(&order).await?;
    Ok(Json(json!({ "order": order })))
}

/// `DELETE /orders/{id}`
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    PathId(id): PathId,
) -> Result<Json<Value>> {
    state
        .repos()
        .orders
        .delete(owner.id, OrderId::new(id))
        .await?;
    Ok(Json(json!({ "message": "order successfully deleted" })))
}
