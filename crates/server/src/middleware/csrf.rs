//! Session-bound double-submit CSRF protection.
//!
//! A 32-byte token lives in the session under [`CSRF_TOKEN`] and is mirrored
//! into the `csrf_token` cookie. Unsafe requests must echo it in the
//! `X-CSRF-Token` header or a `csrf_token` form field, and the echo must
//! match both copies.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{
        HeaderMap, HeaderValue, Method,
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use tower_sessions::{
    Session,
    cookie::{Cookie, SameSite},
};

use super::session::CSRF_TOKEN;
use crate::error::AppError;
use crate::random;

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_FORM_FIELD: &str = "csrf_token";

/// Largest form body buffered while looking for the form field.
const FORM_BODY_LIMIT: usize = 64 * 1024;

/// The session's anti-forgery token, for handlers that render it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfToken(pub String);

#[derive(Clone, Copy, Debug)]
pub struct CsrfSettings {
    pub secure_cookie: bool,
}

/// Enforce the double-submit check on unsafe methods.
///
/// # Errors
///
/// Returns `BadRequest` when an unsafe request fails the check, and
/// `Internal` when the session is unavailable or no token can be minted.
pub async fn csrf_middleware(
    State(settings): State<CsrfSettings>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = request
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;
    let stored: Option<String> = session.get(CSRF_TOKEN).await?;
    let cookie = request_cookie(request.headers(), CSRF_COOKIE);

    if is_safe(request.method()) {
        let token = match stored {
            Some(token) => token,
            None => {
                let token = generate_token()?;
                session.insert(CSRF_TOKEN, &token).await?;
                token
            }
        };
        request.extensions_mut().insert(CsrfToken(token.clone()));

        let mut response = next.run(request).await;
        if cookie.as_deref() != Some(token.as_str()) {
            set_cookie(&mut response, &token, settings.secure_cookie)?;
        }
        return Ok(response);
    }

    let (presented, mut request) = presented_token(request).await?;
    let token = match (stored, cookie, presented) {
        (Some(stored), Some(cookie), Some(presented))
            if constant_time_compare(&stored, &presented)
                && constant_time_compare(&cookie, &presented) =>
        {
            stored
        }
        _ => {
            tracing::warn!(
                method = %request.method(),
                uri = %request.uri(),
                "CSRF token check failed"
            );
            return Err(AppError::BadRequest(
                "invalid or missing CSRF token".to_string(),
            ));
        }
    };

    request.extensions_mut().insert(CsrfToken(token));
    Ok(next.run(request).await)
}

fn is_safe(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn generate_token() -> Result<String, AppError> {
    let bytes = random::bytes::<32>().map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}

fn set_cookie(response: &mut Response, token: &str, secure: bool) -> Result<(), AppError> {
    let cookie = Cookie::build((CSRF_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .build();
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| AppError::Internal(format!("invalid CSRF cookie: {e}")))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}

/// The token echoed by the client, with the request rebuilt if its form
/// body had to be read.
async fn presented_token(request: Request) -> Result<(Option<String>, Request), AppError> {
    if let Some(value) = request.headers().get(CSRF_HEADER) {
        let token = value.to_str().ok().map(str::to_owned);
        return Ok((token, request));
    }

    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if !is_form {
        return Ok((None, request));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, FORM_BODY_LIMIT)
        .await
        .map_err(|_| AppError::BadRequest("form body too large".to_string()))?;
    let token = url::form_urlencoded::parse(&bytes)
        .find(|(key, _)| key == CSRF_FORM_FIELD)
        .map(|(_, value)| value.into_owned());
    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}

/// Constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            AppError::Internal("CSRF token missing from request extensions".to_string())
        })
    }
}
