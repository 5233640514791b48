//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Panic recovery
//! 2. Sentry hub and HTTP transaction
//! 3. `TraceLayer` (request span)
//! 4. Request ID
//! 5. Security headers
//! 6. Session load/save (health endpoints stop above this)
//! 7. CSRF double-submit check
//! 8. CSP nonce
//! 9. Identity resolution
//!
//! Authorization gates in [`authorize`] are route layers applied per route.

pub mod authorize;
pub mod csp;
pub mod csrf;
pub mod identity;
pub mod recover;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use authorize::{
    CurrentUser, PermissionGate, require_activated, require_authenticated, require_permission,
};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use csrf::{CsrfSettings, CsrfToken, csrf_middleware};
pub use identity::{CurrentIdentity, resolve_identity};
pub use recover::recover_panics;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
