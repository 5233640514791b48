//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Repositories;
use crate::services::accounts::AccountService;
use crate::services::notifier::ActivationNotifier;
use crate::services::password::{PasswordError, Passwords};
use crate::services::tokens::TokenService;
use crate::tasks::BackgroundTasks;

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    repos: Repositories,
    accounts: AccountService,
    tasks: BackgroundTasks,
}

impl AppState {
    /// Wire services over `repos`.
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::Params` if the configured Argon2 costs are
    /// invalid.
    pub fn new(
        config: ServerConfig,
        repos: Repositories,
        notifier: Arc<dyn ActivationNotifier>,
        tasks: BackgroundTasks,
    ) -> Result<Self, PasswordError> {
        let passwords = Passwords::new(&config.password)?;
        let accounts = AccountService::new(
            repos.users.clone(),
            repos.permissions.clone(),
            TokenService::new(repos.tokens.clone()),
            passwords,
            notifier,
            tasks.clone(),
            config.activation_token_ttl,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                repos,
                accounts,
                tasks,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn repos(&self) -> &Repositories {
        &self.inner.repos
    }

    #[must_use]
    pub fn accounts(&self) -> &AccountService {
        &self.inner.accounts
    }

    /// Tracker for work that must finish before shutdown completes.
    #[must_use]
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.inner.tasks
    }
}
