//! Router assembly.

use axum::{Router, extract::Request, middleware};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::{
    CsrfSettings, create_session_layer, csp_nonce_middleware, csrf_middleware, recover_panics,
    request_id_middleware, resolve_identity, security_headers_middleware,
};
use crate::routes;
use crate::state::AppState;

/// Build the full application over `session_store`.
///
/// Layers are listed innermost first; see [`crate::middleware`] for the
/// resulting order.
pub fn build_app<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let secure = state.config().secure_cookies();

    let dynamic = routes::routes(&state)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_identity,
        ))
        .layer(middleware::from_fn(csp_nonce_middleware))
        .layer(middleware::from_fn_with_state(
            CsrfSettings {
                secure_cookie: secure,
            },
            csrf_middleware,
        ))
        .layer(create_session_layer(session_store, secure));

    Router::new()
        .merge(routes::health_routes())
        .merge(dynamic)
        .fallback(routes::users::not_found)
        .with_state(state)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(middleware::from_fn(recover_panics))
}
