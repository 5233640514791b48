//! Invoice handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

use paperback_core::{
    Filters, Invoice, InvoiceId, InvoiceInput, InvoicePatch, InvoiceSort, InvoiceStatus, OrderId,
    PageQuery, ValidationErrors,
};

use super::extract::{JsonBody, PathId, QueryParams};
use crate::db::InvoiceFilter;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub order_id: Option<String>,
    pub status: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

impl ListQuery {
    fn parse(
        &self,
    ) -> std::result::Result<(InvoiceFilter, Filters<InvoiceSort>), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut filter = InvoiceFilter::default();

        if let Some(raw) = self.order_id.as_deref().filter(|s| !s.is_empty()) {
            match raw.parse::<i64>() {
                Ok(id) if id > 0 => filter.order_id = Some(OrderId::new(id)),
                _ => errors.add("order_id", "must be a positive integer"),
            }
        }
        if let Some(raw) = self.status.as_deref().filter(|s| !s.is_empty()) {
            match raw.parse::<InvoiceStatus>() {
                Ok(status) => filter.status = Some(status),
                Err(e) => errors.add("status", e.to_string()),
            }
        }
        let filters = Filters::parse(&self.page).unwrap_or_else(|e| {
            errors.merge(e);
            Filters::default()
        });

        errors.into_result()?;
        Ok((filter, filters))
    }
}

/// `GET /invoices`
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Value>> {
    let (filter, filters) = query.parse()?;
    let (invoices, metadata) = state.repos().invoices.list(&filter, &filters).await?;
    Ok(Json(json!({ "invoices": invoices, "metadata": metadata })))
}

/// `POST /invoices`
pub async fn create(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<InvoiceInput>,
) -> Result<impl IntoResponse> {
    let new = input.validate()?;
    let created = state.repos().invoices.insert(&new).await?;

    let invoice = Invoice {
        id: created.id,
        order_id: new.order_id,
        created_at: created.created_at,
        status: new.status,
        version: created.version,
    };

    Ok((
        StatusCode::CREATED,
        [(LOCATION, format!("/invoices/{}", invoice.id))],
        Json(json!({ "invoice": invoice })),
    ))
}

/// `GET /invoices/{id}`
pub async fn show(State(state): State<AppState>, PathId(id): PathId) -> Result<Json<Value>> {
    let invoice = state.repos().invoices.get(InvoiceId::new(id)).await?;
    Ok(Json(json!({ "invoice": invoice })))
}

/// `PATCH /invoices/{id}`
pub async fn update(
    State(state): State<AppState>,
    PathId(id): PathId,
    JsonBody(patch): JsonBody<InvoicePatch>,
) -> Result<Json<Value>> {
    let current = state.repos().invoices.get(InvoiceId::new(id)).await?;
    let mut invoice = patch.apply(&current)?;
    invoice.version = state.repos().invoices.update(&invoice).await?;
    Ok(Json(json!({ "invoice": invoice })))
}

/// `DELETE /invoices/{id}`
pub async fn delete(State(state): State<AppState>, PathId(id): PathId) -> Result<Json<Value>> {
    state.repos().invoices.delete(InvoiceId::new(id)).await?;
    Ok(Json(json!({ "message": "invoice successfully deleted" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_collects_every_error() {
        let query = ListQuery {
            order_id: Some("-3".into()),
            status: Some("overdue".into()),
            page: PageQuery {
                page: Some("0".into()),
                ..PageQuery::default()
            },
        };
        let errors = query.parse().unwrap_err();
        assert_eq!(errors.get("order_id"), Some("must be a positive integer"));
        assert_eq!(errors.get("status"), Some("must be one of: unpaid, paid"));
        assert_eq!(errors.get("page"), Some("must be greater than zero"));
    }

    #[test]
    fn test_list_query_defaults() {
        let (filter, filters) = ListQuery::default().parse().unwrap();
        assert!(filter.order_id.is_none());
        assert!(filter.status.is_none());
        assert_eq!(filters, Filters::default());
    }
}
