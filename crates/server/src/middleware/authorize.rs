//! Authorization gates.
//!
//! Three route layers, each running the tier below it first:
//!
//! 1. [`require_authenticated`]: Anonymous is redirected to the login page
//! 2. [`require_activated`]: unactivated accounts get `403`
//! 3. [`require_permission`]: the account must hold a permission code,
//!    fetched fresh on every request
//!
//! Responses that pass a gate are marked `Cache-Control: no-store`.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header::CACHE_CONTROL, request::Parts},
    middleware::Next,
    response::Response,
};

use paperback_core::{Identity, PermissionCode, User};

use crate::db::PermissionRepository;
use crate::error::AppError;

fn authenticated(request: &Request) -> Result<&User, AppError> {
    match request.extensions().get::<Identity>() {
        Some(Identity::Account(user)) => Ok(user),
        Some(Identity::Anonymous) => Err(AppError::Unauthenticated),
        None => Err(AppError::Internal(
            "identity missing from request extensions".to_string(),
        )),
    }
}

fn activated(request: &Request) -> Result<&User, AppError> {
    let user = authenticated(request)?;
    if !user.activated {
        return Err(AppError::NotActivated);
    }
    Ok(user)
}

fn no_store(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// # Errors
///
/// Returns `Unauthenticated` for anonymous callers.
pub async fn require_authenticated(request: Request, next: Next) -> Result<Response, AppError> {
    authenticated(&request)?;
    Ok(no_store(next.run(request).await))
}

/// # Errors
///
/// Returns `Unauthenticated` or `NotActivated`.
pub async fn require_activated(request: Request, next: Next) -> Result<Response, AppError> {
    activated(&request)?;
    Ok(no_store(next.run(request).await))
}

/// State for [`require_permission`]: which code to demand and where to look.
#[derive(Clone)]
pub struct PermissionGate {
    permissions: Arc<dyn PermissionRepository>,
    code: PermissionCode,
}

impl PermissionGate {
    #[must_use]
    pub fn new(permissions: Arc<dyn PermissionRepository>, code: PermissionCode) -> Self {
        Self { permissions, code }
    }
}

/// # Errors
///
/// Returns `Unauthenticated`, `NotActivated`, `NotPermitted`, or a
/// repository error if the grants cannot be read.
pub async fn require_permission(
    State(gate): State<PermissionGate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = activated(&request)?.id;

    let permissions = gate.permissions.all_for_user(user_id).await?;
    if !permissions.includes(gate.code) {
        tracing::debug!(user_id = %user_id, code = %gate.code, "Permission denied");
        return Err(AppError::NotPermitted);
    }

    Ok(no_store(next.run(request).await))
}

/// The authenticated account, for handlers behind a gate.
///
/// Anonymous callers are rejected with the tier-1 redirect.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(Identity::Account(user)) => Ok(Self(user.clone())),
            Some(Identity::Anonymous) => Err(AppError::Unauthenticated),
            None => Err(AppError::Internal(
                "identity missing from request extensions".to_string(),
            )),
        }
    }
}
