//! Session layer configuration and session keys.

use tower_sessions::{
    Expiry, SessionManagerLayer, SessionStore,
    cookie::{SameSite, time::Duration},
};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "paperback_session";

/// Session key holding the authenticated user's id.
pub const AUTHENTICATED_USER_ID: &str = "authenticated_user_id";

/// Session key holding the anti-forgery token.
pub const CSRF_TOKEN: &str = "csrf_token";

/// Inactivity window after which a session lapses (12 hours).
const SESSION_EXPIRY_SECONDS: i64 = 12 * 60 * 60;

/// Session layer over `store`.
///
/// `secure` is on unless the deployment opted out for plain HTTP.
#[must_use]
pub fn create_session_layer<S>(store: S, secure: bool) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            SESSION_EXPIRY_SECONDS,
        )))
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
