//! Token scopes and plaintext validation.
//!
//! Plaintexts are 16 random bytes encoded as unpadded URL-safe base64. Only a
//! SHA-256 digest of the plaintext is ever stored; the server crate owns
//! generation and hashing.

use serde::{Deserialize, Serialize};

use super::ValidationErrors;

/// Length of an encoded plaintext: `ceil(16 * 4 / 3)` without padding.
pub const TOKEN_PLAINTEXT_LENGTH: usize = 22;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    Activation,
    /// Bearer tokens for API clients. Nothing issues these yet; sessions
    /// carry authentication.
    Authentication,
}

impl TokenScope {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Authentication => "authentication",
        }
    }
}

impl std::fmt::Display for TokenScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token plaintext that passed shape validation.
///
/// This says nothing about whether the token exists; it only guarantees a
/// lookup is worth doing.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPlaintext(String);

impl TokenPlaintext {
    /// Validates a user-submitted plaintext.
    ///
    /// # Errors
    ///
    /// Returns a `token` field error if the input is empty, has the wrong
    /// length or contains characters outside the URL-safe base64 alphabet.
    pub fn parse(s: &str) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(!s.is_empty(), "token", "must be provided");
        errors.check(
            s.len() == TOKEN_PLAINTEXT_LENGTH,
            "token",
            format!("must be {TOKEN_PLAINTEXT_LENGTH} characters long"),
        );
        errors.check(
            s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'),
            "token",
            "contains invalid characters",
        );
        errors.into_result()?;
        Ok(Self(s.to_owned()))
    }

    /// Wraps a freshly generated plaintext without re-validating it.
    #[must_use]
    pub const fn from_generated(s: String) -> Self {
        Self(s)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for TokenPlaintext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenPlaintext([REDACTED])")
    }
}

impl Serialize for TokenPlaintext {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_url_safe_plaintext() {
        assert!(TokenPlaintext::parse("AbCdEfGhIjKlMnOpQr-_09").is_ok());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = TokenPlaintext::parse("short").err();
        assert_eq!(
            err.as_ref().and_then(|e| e.get("token")),
            Some("must be 22 characters long")
        );
    }

    #[test]
    fn test_parse_rejects_empty() {
        let err = TokenPlaintext::parse("").err();
        assert_eq!(
            err.as_ref().and_then(|e| e.get("token")),
            Some("must be provided")
        );
    }

    #[test]
    fn test_parse_rejects_foreign_alphabet() {
        let err = TokenPlaintext::parse("AbCdEfGhIjKlMnOpQr+/09").err();
        assert_eq!(
            err.as_ref().and_then(|e| e.get("token")),
            Some("contains invalid characters")
        );
    }

    #[test]
    fn test_debug_hides_plaintext() {
        let token = TokenPlaintext::from_generated("AbCdEfGhIjKlMnOpQr-_09".into());
        assert!(!format!("{token:?}").contains("AbCd"));
    }
}
