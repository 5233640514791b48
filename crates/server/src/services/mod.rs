//! Business logic services.
//!
//! # Services
//!
//! - `accounts` - Sign-up, login, activation and profile edits
//! - `notifier` - Activation token delivery
//! - `password` - Argon2id hashing
//! - `tokens` - Activation token issue, verify and revoke

pub mod accounts;
pub mod notifier;
pub mod password;
pub mod tokens;

pub use accounts::{AccountError, AccountService};
pub use notifier::{ActivationNotifier, LogNotifier, NotifyError};
pub use password::{PasswordError, Passwords};
pub use tokens::{Token, TokenError, TokenService};
