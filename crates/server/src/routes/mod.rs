//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                  - Liveness
//! GET    /health/ready            - Store reachability
//! GET    /healthcheck             - Environment and version
//!
//! # Accounts
//! POST   /user/signup             - Create an unactivated account
//! POST   /user/activation-token   - Re-send activation token
//! GET    /user/activate           - Activation link landing (CSRF token)
//! PUT    /user/activated          - Activate with a token
//! GET    /user/login              - Login form data (CSRF token)
//! POST   /user/login              - Log in
//! POST   /user/logout             - Log out
//! GET    /user/me                 - Current account (authenticated)
//! PATCH  /user/me                 - Edit name/email (authenticated)
//! GET    /user/csrf               - CSRF token for this session
//!
//! # Products (products:read / products:write)
//! GET    /products                - List
//! POST   /products                - Create
//! GET    /products/{id}           - Show
//! PATCH  /products/{id}           - Update
//! DELETE /products/{id}           - Delete
//!
//! # Orders (activated, owner-scoped)
//! GET    /orders, POST /orders, GET|PATCH|DELETE /orders/{id}
//!
//! # Invoices (invoices:read / invoices:write)
//! GET    /invoices, POST /invoices, GET|PATCH|DELETE /invoices/{id}
//! ```

pub mod extract;
pub mod health;
pub mod invoices;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Router, middleware,
    routing::{get, patch, post, put},
};

use paperback_core::PermissionCode;

use crate::middleware::{
    PermissionGate, require_activated, require_authenticated, require_permission,
};
use crate::state::AppState;

fn gate(state: &AppState, code: PermissionCode) -> PermissionGate {
    PermissionGate::new(state.repos().permissions.clone(), code)
}

/// Routes that need no session.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/healthcheck", get(health::healthcheck))
}

/// Create the account routes router.
pub fn user_routes() -> Router<AppState> {
    let open = Router::new()
        .route("/user/signup", post(users::signup))
        .route("/user/activation-token", post(users::reissue_activation))
        .route("/user/activate", get(users::activation_form))
        .route("/user/activated", put(users::activate))
        .route("/user/login", get(users::login_form).post(users::login))
        .route("/user/logout", post(users::logout))
        .route("/user/csrf", get(users::csrf));

    let signed_in = Router::new()
        .route("/user/me", get(users::me).patch(users::update_me))
        .route_layer(middleware::from_fn(require_authenticated));

    open.merge(signed_in)
}

/// Create the product routes router.
pub fn product_routes(state: &AppState) -> Router<AppState> {
    let read = Router::new()
        .route("/products", get(products::list))
        .route("/products/{id}", get(products::show))
        .route_layer(middleware::from_fn_with_state(
            gate(state, PermissionCode::PRODUCTS_READ),
            require_permission,
        ));

    let write = Router::new()
        .route("/products", post(products::create))
        .route(
            "/products/{id}",
            patch(products::update).delete(products::delete),
        )
        .route_layer(middleware::from_fn_with_state(
            gate(state, PermissionCode::PRODUCTS_WRITE),
            require_permission,
        ));

    read.merge(write)
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::list).post(orders::create))
        .route(
            "/orders/{id}",
            get(orders::show)
                .patch(orders::update)
                .delete(orders::delete),
        )
        .route_layer(middleware::from_fn(require_activated))
}

/// Create the invoice routes router.
pub fn invoice_routes(state: &AppState) -> Router<AppState> {
    let read = Router::new()
        .route("/invoices", get(invoices::list))
        .route("/invoices/{id}", get(invoices::show))
        .route_layer(middleware::from_fn_with_state(
            gate(state, PermissionCode::INVOICES_READ),
            require_permission,
        ));

    let write = Router::new()
        .route("/invoices", post(invoices::create))
        .route(
            "/invoices/{id}",
            patch(invoices::update).delete(invoices::delete),
        )
        .route_layer(middleware::from_fn_with_state(
            gate(state, PermissionCode::INVOICES_WRITE),
            require_permission,
        ));

    read.merge(write)
}

/// Every session-bearing route.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(user_routes())
        .merge(product_routes(state))
        .merge(order_routes())
        .merge(invoice_routes(state))
}
