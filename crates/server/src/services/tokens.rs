//! Activation token issuance and verification.
//!
//! The plaintext handed to the user is 16 random bytes as unpadded URL-safe
//! base64. Only its SHA-256 digest reaches storage.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use paperback_core::{TokenPlaintext, TokenScope, User, UserId};

use crate::db::{RepositoryError, TokenRecord, TokenRepository};
use crate::random::{self, RandomnessError};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Randomness(#[from] RandomnessError),

    #[error("token lifetime out of range")]
    InvalidTtl,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A freshly issued token. The plaintext exists only in this value.
#[derive(Debug, Clone)]
pub struct Token {
    pub plaintext: TokenPlaintext,
    pub user_id: UserId,
    pub expiry: DateTime<Utc>,
    pub scope: TokenScope,
}

/// SHA-256 digest of a plaintext, as stored.
#[must_use]
pub fn hash_plaintext(plaintext: &TokenPlaintext) -> Vec<u8> {
    Sha256::digest(plaintext.as_str().as_bytes()).to_vec()
}

#[derive(Clone)]
pub struct TokenService {
    tokens: Arc<dyn TokenRepository>,
}

impl TokenService {
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenRepository>) -> Self {
        Self { tokens }
    }

    /// Mint a token for `user_id` valid for `ttl` and store its digest.
    ///
    /// # Errors
    ///
    /// Fails if the random source fails, `ttl` does not fit a timestamp, or
    /// the digest cannot be stored.
    pub async fn issue(
        &self,
        user_id: UserId,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<Token, TokenError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| TokenError::InvalidTtl)?;
        let expiry = Utc::now()
            .checked_add_signed(ttl)
            .ok_or(TokenError::InvalidTtl)?;

        let bytes = random::bytes::<16>()?;
        let plaintext = TokenPlaintext::from_generated(URL_SAFE_NO_PAD.encode(bytes));

        self.tokens
            .insert(&TokenRecord {
                hash: hash_plaintext(&plaintext),
                user_id,
                expiry,
                scope,
            })
            .await?;

        tracing::debug!(user_id = %user_id, scope = %scope, "Issued token");

        Ok(Token {
            plaintext,
            user_id,
            expiry,
            scope,
        })
    }

    /// The owner of a live token. Unknown, expired and wrong-scope tokens
    /// are all `RepositoryError::NotFound`.
    ///
    /// # Errors
    ///
    /// Returns the repository error.
    pub async fn verify(
        &self,
        scope: TokenScope,
        plaintext: &TokenPlaintext,
    ) -> Result<User, TokenError> {
        Ok(self
            .tokens
            .find_owner(scope, &hash_plaintext(plaintext), Utc::now())
            .await?)
    }

    /// Revoke every token of `scope` held by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns the repository error.
    pub async fn invalidate_all(
        &self,
        scope: TokenScope,
        user_id: UserId,
    ) -> Result<(), TokenError> {
        self.tokens.delete_all_for_user(scope, user_id).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{InMemoryStore, NewUserRecord, UserRepository};
    use paperback_core::{Email, TOKEN_PLAINTEXT_LENGTH};

    async fn setup() -> (TokenService, UserId) {
        let store = Arc::new(InMemoryStore::new());
        let user = UserRepository::insert(
            &*store,
            &NewUserRecord {
                name: "Ada".into(),
                email: Email::parse("ada@example.com").unwrap(),
                password_hash: "x".into(),
            },
        )
        .await
        .unwrap();
        (TokenService::new(store), user.id)
    }

    #[tokio::test]
    async fn test_issue_then_verify() {
        let (service, user_id) = setup().await;
        let token = service
            .issue(user_id, Duration::from_secs(3600), TokenScope::Activation)
            .await
            .unwrap();

        assert_eq!(token.plaintext.as_str().len(), TOKEN_PLAINTEXT_LENGTH);
        assert!(TokenPlaintext::parse(token.plaintext.as_str()).is_ok());

        let owner = service
            .verify(TokenScope::Activation, &token.plaintext)
            .await
            .unwrap();
        assert_eq!(owner.id, user_id);
    }

    #[tokio::test]
    async fn test_expired_token_not_found() {
        let (service, user_id) = setup().await;
        let token = service
            .issue(user_id, Duration::ZERO, TokenScope::Activation)
            .await
            .unwrap();
        let result = service.verify(TokenScope::Activation, &token.plaintext).await;
        assert!(matches!(
            result,
            Err(TokenError::Repository(RepositoryError::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_invalidate_all_revokes() {
        let (service, user_id) = setup().await;
        let first = service
            .issue(user_id, Duration::from_secs(60), TokenScope::Activation)
            .await
            .unwrap();
        let second = service
            .issue(user_id, Duration::from_secs(60), TokenScope::Activation)
            .await
            .unwrap();
        assert_ne!(first.plaintext, second.plaintext);

        service
            .invalidate_all(TokenScope::Activation, user_id)
            .await
            .unwrap();
        for token in [first, second] {
            assert!(
                service
                    .verify(TokenScope::Activation, &token.plaintext)
                    .await
                    .is_err()
            );
        }
    }

    #[tokio::test]
    async fn test_altered_plaintext_not_found() {
        let (service, user_id) = setup().await;
        let token = service
            .issue(user_id, Duration::from_secs(60), TokenScope::Activation)
            .await
            .unwrap();

        let mut altered = token.plaintext.as_str().to_owned();
        let last = if altered.ends_with('A') { "B" } else { "A" };
        altered.replace_range(altered.len() - 1.., last);
        let altered = TokenPlaintext::parse(&altered).unwrap();

        let result = service.verify(TokenScope::Activation, &altered).await;
        assert!(matches!(
            result,
            Err(TokenError::Repository(RepositoryError::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_wrong_scope_not_found() {
        let (service, user_id) = setup().await;
        let token = service
            .issue(user_id, Duration::from_secs(60), TokenScope::Activation)
            .await
            .unwrap();

        let result = service
            .verify(TokenScope::Authentication, &token.plaintext)
            .await;
        assert!(matches!(
            result,
            Err(TokenError::Repository(RepositoryError::NotFound))
        ));
    }

    #[test]
    fn test_digest_is_sha256() {
        let plaintext = TokenPlaintext::from_generated("AbCdEfGhIjKlMnOpQr-_09".into());
        let digest = hash_plaintext(&plaintext);
        assert_eq!(digest.len(), 32);
        assert_eq!(digest, hash_plaintext(&plaintext));
    }
}
