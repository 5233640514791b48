//! Paperback Core - Shared domain types.
//!
//! This crate provides the types used across all Paperback components:
//! - `server` - The HTTP server (sessions, authorization, resources)
//! - `cli` - Command-line tools for migrations and permission management
//!
//! # Architecture
//!
//! The core crate contains only types, validation and pure helpers - no I/O,
//! no database access, no HTTP. Everything here can be unit tested without a
//! runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, statuses, permissions, token scopes and
//!   the field-keyed [`ValidationErrors`] collection
//! - [`domain`] - Users, products, orders, invoices and the request [`Identity`]
//! - [`filters`] - List pagination/sorting input and response metadata

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod domain;
pub mod filters;
pub mod types;

pub use domain::*;
pub use filters::{
    Filters, InvoiceSort, Metadata, OrderSort, PageQuery, ProductSort, SortDirection, SortKey,
};
pub use types::*;
