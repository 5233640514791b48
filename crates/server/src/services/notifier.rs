//! Activation link delivery.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use paperback_core::{TokenPlaintext, User};

/// Path of the page an activation link opens.
pub const ACTIVATION_PAGE_PATH: &str = "/user/activate";

#[derive(Debug, Error)]
#[error("activation delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers a freshly minted activation token to its owner.
#[async_trait]
pub trait ActivationNotifier: Send + Sync {
    async fn send_activation(&self, user: &User, token: &TokenPlaintext)
    -> Result<(), NotifyError>;
}

/// Writes the activation link to the log instead of sending mail.
pub struct LogNotifier {
    base_url: Url,
}

impl LogNotifier {
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    /// Page the user visits to submit `token`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the base URL cannot carry a path.
    pub fn activation_link(&self, token: &TokenPlaintext) -> Result<Url, NotifyError> {
        let mut link = self
            .base_url
            .join(ACTIVATION_PAGE_PATH)
            .map_err(|e| NotifyError(e.to_string()))?;
        link.query_pairs_mut().append_pair("token", token.as_str());
        Ok(link)
    }
}

#[async_trait]
impl ActivationNotifier for LogNotifier {
    async fn send_activation(
        &self,
        user: &User,
        token: &TokenPlaintext,
    ) -> Result<(), NotifyError> {
        let link = self.activation_link(token)?;
        tracing::info!(
            user_id = %user.id,
            email = %user.email,
            link = %link,
            "Activation link ready for delivery"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_link() {
        let notifier = LogNotifier::new(Url::parse("https://shop.example.com/app/").unwrap());
        let token = TokenPlaintext::from_generated("AbCdEfGhIjKlMnOpQr-_09".into());
        let link = notifier.activation_link(&token).unwrap();
        assert_eq!(
            link.as_str(),
            "https://shop.example.com/user/activate?token=AbCdEfGhIjKlMnOpQr-_09"
        );
    }
}
