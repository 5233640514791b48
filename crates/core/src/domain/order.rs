//! Customer orders. Always owned by exactly one account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderId, OrderStatus, UserId, ValidationErrors};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub total_price: i32,
    pub status: OrderStatus,
    pub version: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderInput {
    pub total_price: i32,
    pub status: Option<String>,
}

/// Validated creation fields. The owner is supplied by the caller's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub total_price: i32,
    pub status: OrderStatus,
}

impl OrderInput {
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(self) -> Result<NewOrder, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(self.total_price >= 0, "total_price", "must be zero or greater");
        let status = parse_status(&mut errors, self.status.as_deref());
        errors.into_result()?;
        Ok(NewOrder {
            total_price: self.total_price,
            status: status.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderPatch {
    pub version: i32,
    pub total_price: Option<i32>,
    pub status: Option<String>,
}

impl OrderPatch {
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn apply(self, current: &Order) -> Result<Order, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut order = current.clone();

        if let Some(total_price) = self.total_price {
            errors.check(total_price >= 0, "total_price", "must be zero or greater");
            order.total_price = total_price;
        }
        if let Some(status) = parse_status(&mut errors, self.status.as_deref()) {
            order.status = status;
        }
        errors.into_result()?;

        order.version = self.version;
        Ok(order)
    }
}

fn parse_status(errors: &mut ValidationErrors, raw: Option<&str>) -> Option<OrderStatus> {
    match raw?.parse() {
        Ok(status) => Some(status),
        Err(e) => {
            errors.add("status", e.to_string());
            None
        }
    }
}
