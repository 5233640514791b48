//! Domain objects and their input validation.
//!
//! Each versioned resource comes with two input types: one for creation,
//! validated as a whole, and a patch whose present fields are applied onto
//! the stored value before the merged result is validated again.

pub mod identity;
pub mod invoice;
pub mod order;
pub mod product;
pub mod user;

pub use identity::Identity;
pub use invoice::{Invoice, InvoiceInput, InvoicePatch, NewInvoice};
pub use order::{NewOrder, Order, OrderInput, OrderPatch};
pub use product::{NewProduct, Product, ProductInput, ProductPatch};
pub use user::{Credentials, NewUser, SignupInput, User, UserPatch};

/// Identity, creation timestamp and starting version of a freshly inserted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Created<Id> {
    pub id: Id,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub version: i32,
}
