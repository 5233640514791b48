//! Permission management commands.
//!
//! # Usage
//!
//! ```bash
//! paperback-cli permissions grant -e alice@example.com -c invoices:write
//! ```

use std::time::Duration;

use paperback_core::{Email, PermissionCode};
use paperback_server::db::{
    PermissionRepository, PgPermissionRepository, PgUserRepository, RepositoryError,
    UserRepository,
};
use thiserror::Error;

use super::{ConnectError, connect};

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Unknown permission code: {0}. Valid codes: {valid}", valid = valid_codes())]
    UnknownCode(String),

    #[error("No user with email: {0}")]
    UnknownUser(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Grant `code` to the account registered under `email`.
pub async fn grant(email: &str, code: &str) -> Result<(), PermissionError> {
    let code = parse_code(code)?;
    let parsed = Email::parse(email).map_err(|_| PermissionError::InvalidEmail(email.to_owned()))?;

    let pool = connect().await?;
    let users = PgUserRepository::new(pool.clone(), QUERY_TIMEOUT);
    let permissions = PgPermissionRepository::new(pool, QUERY_TIMEOUT);

    let user = match users.get_by_email(&parsed).await {
        Ok(user) => user,
        Err(RepositoryError::NotFound) => {
            return Err(PermissionError::UnknownUser(email.to_owned()));
        }
        Err(e) => return Err(e.into()),
    };

    permissions.add_for_user(user.id, &[code]).await?;
    tracing::info!("Granted {} to {} (user {})", code, email, user.id);
    Ok(())
}

fn parse_code(code: &str) -> Result<PermissionCode, PermissionError> {
    PermissionCode::find(code).ok_or_else(|| PermissionError::UnknownCode(code.to_owned()))
}

fn valid_codes() -> String {
    PermissionCode::ALL
        .iter()
        .map(PermissionCode::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_code() {
        assert_eq!(
            parse_code("invoices:write").unwrap(),
            PermissionCode::INVOICES_WRITE
        );
    }

    #[test]
    fn test_unknown_code_lists_valid_codes() {
        let err = parse_code("admin:all").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("admin:all"));
        assert!(message.contains("products:read, products:write, invoices:read, invoices:write"));
    }
}
