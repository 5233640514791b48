//! Invoices raised against orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{InvoiceId, InvoiceStatus, OrderId, ValidationErrors};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub version: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InvoiceInput {
    pub order_id: i64,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub order_id: OrderId,
    pub status: InvoiceStatus,
}

impl InvoiceInput {
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(self) -> Result<NewInvoice, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let order_id = OrderId::new(self.order_id);
        errors.check(order_id.is_positive(), "order_id", "must be a positive integer");
        let status = parse_status(&mut errors, self.status.as_deref());
        errors.into_result()?;
        Ok(NewInvoice {
            order_id,
            status: status.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicePatch {
    pub version: i32,
    pub status: Option<String>,
}

impl InvoicePatch {
    /// # Errors
    ///
    /// Returns a `status` error for an unknown status.
    pub fn apply(self, current: &Invoice) -> Result<Invoice, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut invoice = current.clone();
        if let Some(status) = parse_status(&mut errors, self.status.as_deref()) {
            invoice.status = status;
        }
        errors.into_result()?;
        invoice.version = self.version;
        Ok(invoice)
    }
}

fn parse_status(errors: &mut ValidationErrors, raw: Option<&str>) -> Option<InvoiceStatus> {
    match raw?.parse() {
        Ok(status) => Some(status),
        Err(e) => {
            errors.add("status", e.to_string());
            None
        }
    }
}
