//! Core types for Paperback.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod permission;
pub mod status;
pub mod token;
pub mod validation;

pub use email::{Email, EmailError};
pub use id::*;
pub use permission::{PermissionCode, Permissions};
pub use status::*;
pub use token::{TOKEN_PLAINTEXT_LENGTH, TokenPlaintext, TokenScope};
pub use validation::ValidationErrors;
