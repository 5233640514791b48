//! Paperback server library.
//!
//! Sessions, authorization gates and version-guarded resources behind an
//! axum router. The binary in `main.rs` wires it to `PostgreSQL`; tests wire
//! it to the in-memory store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod random;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;
pub mod tasks;

pub use app::build_app;
pub use state::AppState;
