//! Account lifecycle: sign-up, login, activation and profile edits.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use paperback_core::{
    Credentials, Email, PermissionCode, SignupInput, TokenPlaintext, TokenScope, User, UserPatch,
    ValidationErrors,
};

use super::notifier::ActivationNotifier;
use super::password::{PasswordError, Passwords};
use super::tokens::{TokenError, TokenService};
use crate::db::{NewUserRecord, PermissionRepository, RepositoryError, UserRepository};
use crate::tasks::BackgroundTasks;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("password worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

const DUPLICATE_EMAIL: &str = "a user with this email address already exists";

fn duplicate_email(e: RepositoryError) -> AccountError {
    match e {
        RepositoryError::Duplicate { field: "email" } => {
            ValidationErrors::single("email", DUPLICATE_EMAIL).into()
        }
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    permissions: Arc<dyn PermissionRepository>,
    tokens: TokenService,
    passwords: Passwords,
    notifier: Arc<dyn ActivationNotifier>,
    tasks: BackgroundTasks,
    activation_ttl: Duration,
}

impl AccountService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        permissions: Arc<dyn PermissionRepository>,
        tokens: TokenService,
        passwords: Passwords,
        notifier: Arc<dyn ActivationNotifier>,
        tasks: BackgroundTasks,
        activation_ttl: Duration,
    ) -> Self {
        Self {
            users,
            permissions,
            tokens,
            passwords,
            notifier,
            tasks,
            activation_ttl,
        }
    }

    /// Create an unactivated account with the default permissions and send
    /// it an activation token.
    ///
    /// # Errors
    ///
    /// Returns field errors for bad input or a taken email, and storage or
    /// hashing failures otherwise.
    pub async fn signup(&self, input: SignupInput) -> Result<User, AccountError> {
        let new_user = input.validate()?;

        let passwords = self.passwords.clone();
        let password = new_user.password;
        let password_hash =
            tokio::task::spawn_blocking(move || passwords.hash(&password)).await??;

        let user = self
            .users
            .insert(&NewUserRecord {
                name: new_user.name,
                email: new_user.email,
                password_hash,
            })
            .await
            .map_err(duplicate_email)?;

        self.permissions
            .add_for_user(user.id, PermissionCode::DEFAULTS)
            .await?;

        self.send_activation(&user).await?;

        tracing::info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    /// The account matching `credentials`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown email or wrong password
    /// alike.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<User, AccountError> {
        let email = credentials.validate()?;

        let user = match self.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(RepositoryError::NotFound) => return Err(AccountError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        let passwords = self.passwords.clone();
        let password = credentials.password.clone();
        let hash = user.password_hash.clone();
        let matches =
            tokio::task::spawn_blocking(move || passwords.verify(&password, &hash)).await??;

        if !matches {
            return Err(AccountError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Consume an activation token and mark its owner activated.
    ///
    /// # Errors
    ///
    /// Returns a `token` field error for a malformed, unknown or expired
    /// token and `EditConflict` if the account changed concurrently.
    pub async fn activate(&self, plaintext: &str) -> Result<User, AccountError> {
        let plaintext = TokenPlaintext::parse(plaintext)?;

        let mut user = match self.tokens.verify(TokenScope::Activation, &plaintext).await {
            Ok(user) => user,
            Err(TokenError::Repository(RepositoryError::NotFound)) => {
                return Err(
                    ValidationErrors::single("token", "invalid or expired activation token").into(),
                );
            }
            Err(e) => return Err(e.into()),
        };

        user.activated = true;
        user.version = self.users.update(&user).await?;

        self.tokens
            .invalidate_all(TokenScope::Activation, user.id)
            .await?;

        tracing::info!(user_id = %user.id, "User activated");
        Ok(user)
    }

    /// Replace any outstanding activation tokens for `email` with a new one.
    ///
    /// # Errors
    ///
    /// Returns an `email` field error if no such account exists or it is
    /// already activated.
    pub async fn reissue_activation(&self, email: &str) -> Result<(), AccountError> {
        let mut errors = ValidationErrors::new();
        let email = paperback_core::domain::user::validate_email(&mut errors, email);
        errors.into_result()?;
        let email: Email =
            email.ok_or_else(|| ValidationErrors::single("email", "must be provided"))?;

        let user = match self.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(RepositoryError::NotFound) => {
                return Err(
                    ValidationErrors::single("email", "no matching email address found").into(),
                );
            }
            Err(e) => return Err(e.into()),
        };

        if user.activated {
            return Err(ValidationErrors::single("email", "user has already been activated").into());
        }

        self.tokens
            .invalidate_all(TokenScope::Activation, user.id)
            .await?;
        self.send_activation(&user).await?;
        Ok(())
    }

    /// Apply `patch` to `current` under its version guard.
    ///
    /// # Errors
    ///
    /// Returns field errors, `EditConflict` for a stale version, or a
    /// duplicate-email field error.
    pub async fn update_profile(
        &self,
        current: &User,
        patch: UserPatch,
    ) -> Result<User, AccountError> {
        let mut user = patch.apply(current)?;
        user.version = self.users.update(&user).await.map_err(duplicate_email)?;
        Ok(user)
    }

    async fn send_activation(&self, user: &User) -> Result<(), AccountError> {
        let token = self
            .tokens
            .issue(user.id, self.activation_ttl, TokenScope::Activation)
            .await?;

        let notifier = self.notifier.clone();
        let user = user.clone();
        self.tasks.spawn("send_activation", async move {
            if let Err(e) = notifier.send_activation(&user, &token.plaintext).await {
                tracing::error!(
                    user_id = %user.id,
                    error = %e,
                    "Failed to deliver activation token"
                );
            }
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::PasswordConfig;
    use crate::db::InMemoryStore;
    use crate::services::notifier::NotifyError;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<String>>);

    #[async_trait]
    impl ActivationNotifier for Outbox {
        async fn send_activation(
            &self,
            _user: &User,
            token: &TokenPlaintext,
        ) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(token.as_str().to_owned());
            Ok(())
        }
    }

    struct Harness {
        accounts: AccountService,
        store: Arc<InMemoryStore>,
        outbox: Arc<Outbox>,
        tasks: BackgroundTasks,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let outbox = Arc::new(Outbox::default());
            let tasks = BackgroundTasks::new();
            let passwords = Passwords::new(&PasswordConfig {
                memory_kib: 64,
                iterations: 1,
                parallelism: 1,
            })
            .unwrap();
            let accounts = AccountService::new(
                store.clone(),
                store.clone(),
                TokenService::new(store.clone()),
                passwords,
                outbox.clone(),
                tasks.clone(),
                Duration::from_secs(3600),
            );
            Self {
                accounts,
                store,
                outbox,
                tasks,
            }
        }

        async fn last_token(&self) -> String {
            self.tasks.close();
            self.tasks.wait().await;
            self.outbox.0.lock().unwrap().last().cloned().unwrap()
        }
    }

    fn signup_input(email: &str) -> SignupInput {
        SignupInput {
            name: "Ada Lovelace".into(),
            email: email.into(),
            password: "pa55word!".into(),
        }
    }

    #[tokio::test]
    async fn test_signup_activate_login() {
        let h = Harness::new();
        let user = h.accounts.signup(signup_input("ada@example.com")).await.unwrap();
        assert!(!user.activated);
        assert_eq!(user.version, 1);

        let permissions = h.store.all_for_user(user.id).await.unwrap();
        assert!(permissions.includes(PermissionCode::PRODUCTS_READ));
        assert!(!permissions.includes(PermissionCode::PRODUCTS_WRITE));

        let token = h.last_token().await;
        let activated = h.accounts.activate(&token).await.unwrap();
        assert!(activated.activated);
        assert_eq!(activated.version, 2);

        let again = h.accounts.activate(&token).await.unwrap_err();
        assert!(matches!(again, AccountError::Validation(ref e) if e.get("token").is_some()));

        let credentials = Credentials {
            email: "ada@example.com".into(),
            password: "pa55word!".into(),
        };
        let logged_in = h.accounts.authenticate(&credentials).await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_field_error() {
        let h = Harness::new();
        h.accounts.signup(signup_input("ada@example.com")).await.unwrap();
        let err = h
            .accounts
            .signup(signup_input("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccountError::Validation(ref e) if e.get("email") == Some(DUPLICATE_EMAIL)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_alike() {
        let h = Harness::new();
        h.accounts.signup(signup_input("ada@example.com")).await.unwrap();

        let wrong = Credentials {
            email: "ada@example.com".into(),
            password: "not-the-password".into(),
        };
        let unknown = Credentials {
            email: "bob@example.com".into(),
            password: "pa55word!".into(),
        };
        assert!(matches!(
            h.accounts.authenticate(&wrong).await,
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            h.accounts.authenticate(&unknown).await,
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_reissue_replaces_previous_token() {
        let h = Harness::new();
        h.accounts.signup(signup_input("ada@example.com")).await.unwrap();
        h.accounts.reissue_activation("ada@example.com").await.unwrap();

        h.tasks.close();
        h.tasks.wait().await;
        let tokens = h.outbox.0.lock().unwrap().clone();
        assert_eq!(tokens.len(), 2);

        assert!(h.accounts.activate(&tokens[0]).await.is_err());
        assert!(h.accounts.activate(&tokens[1]).await.is_ok());

        let err = h
            .accounts
            .reissue_activation("ada@example.com")
            .await
            .unwrap_err();
        let AccountError::Validation(errors) = &err else {
            panic!("expected a validation error, got {err:?}");
        };
        assert_eq!(errors.get("email"), Some("user has already been activated"));
    }

    #[tokio::test]
    async fn test_reissue_unknown_email() {
        let h = Harness::new();
        let err = h
            .accounts
            .reissue_activation("nobody@example.com")
            .await
            .unwrap_err();
        let AccountError::Validation(errors) = &err else {
            panic!("expected a validation error, got {err:?}");
        };
        assert_eq!(errors.get("email"), Some("no matching email address found"));
    }

    #[tokio::test]
    async fn test_update_profile_version_guard() {
        let h = Harness::new();
        let user = h.accounts.signup(signup_input("ada@example.com")).await.unwrap();

        let patch = UserPatch {
            version: user.version,
            name: Some("Countess of Lovelace".into()),
            email: None,
        };
        let updated = h.accounts.update_profile(&user, patch.clone()).await.unwrap();
        assert_eq!(updated.name, "Countess of Lovelace");
        assert_eq!(updated.version, 2);

        let stale = h.accounts.update_profile(&user, patch).await.unwrap_err();
        assert!(matches!(
            stale,
            AccountError::Repository(RepositoryError::EditConflict)
        ));
    }
}
