//! Per-request CSP nonce.
//!
//! Each request gets 16 fresh random bytes, base64-encoded without padding,
//! available to handlers as a [`CspNonce`] and written into the response's
//! `Content-Security-Policy`.

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, header::CONTENT_SECURITY_POLICY, request::Parts},
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};

use crate::error::AppError;
use crate::random::{self, RandomnessError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CspNonce(pub String);

impl CspNonce {
    /// # Errors
    ///
    /// Returns `RandomnessError` if the OS random source fails.
    pub fn generate() -> Result<Self, RandomnessError> {
        Ok(Self(STANDARD_NO_PAD.encode(random::bytes::<16>()?)))
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }

    /// Policy allowing inline scripts and styles carrying this nonce.
    #[must_use]
    pub fn policy(&self) -> String {
        let nonce = &self.0;
        format!(
            "default-src 'none'; \
             script-src 'self' 'nonce-{nonce}'; \
             style-src 'self' 'nonce-{nonce}'; \
             img-src 'self'; \
             connect-src 'self'; \
             base-uri 'self'; \
             form-action 'self'; \
             frame-ancestors 'none'"
        )
    }
}

/// Generate a nonce, expose it to handlers and set the matching CSP header.
///
/// # Errors
///
/// Returns `AppError::Internal` if no nonce can be generated.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Result<Response, AppError> {
    let nonce = CspNonce::generate().map_err(|e| AppError::Internal(e.to_string()))?;
    let policy = HeaderValue::from_str(&nonce.policy())
        .map_err(|e| AppError::Internal(format!("invalid CSP header: {e}")))?;

    request.extensions_mut().insert(nonce);
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(CONTENT_SECURITY_POLICY, policy);
    Ok(response)
}

impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            AppError::Internal("CSP nonce missing from request extensions".to_string())
        })
    }
}
