//! User accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Email, UserId, ValidationErrors};

pub const NAME_MAX_BYTES: usize = 500;
pub const PASSWORD_MIN_BYTES: usize = 8;
pub const PASSWORD_MAX_BYTES: usize = 72;

/// A stored account.
///
/// `password_hash` is a PHC-format digest and is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: Email,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

/// Raw sign-up body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// A sign-up that passed validation, with the password still in plaintext.
#[derive(Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl SignupInput {
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(self) -> Result<NewUser, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_name(&mut errors, &self.name);
        let email = validate_email(&mut errors, &self.email);
        validate_password(&mut errors, &self.password);
        errors.into_result()?;

        let email = email.ok_or_else(|| ValidationErrors::single("email", "must be provided"))?;
        Ok(NewUser {
            name: self.name,
            email,
            password: self.password,
        })
    }
}

/// Login body.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Checks only that both fields are usable; whether they match an
    /// account is the server's concern.
    ///
    /// # Errors
    ///
    /// Returns field errors for a malformed email or password.
    pub fn validate(&self) -> Result<Email, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = validate_email(&mut errors, &self.email);
        validate_password(&mut errors, &self.password);
        errors.into_result()?;
        email.ok_or_else(|| ValidationErrors::single("email", "must be provided"))
    }
}

/// Profile edit. Absent fields keep their stored value.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPatch {
    pub version: i32,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserPatch {
    /// Merges the patch onto `current`. The result carries the caller's
    /// `version`, which the store compares at write time.
    ///
    /// # Errors
    ///
    /// Returns field errors for the merged values.
    pub fn apply(self, current: &User) -> Result<User, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut user = current.clone();

        if let Some(name) = self.name {
            validate_name(&mut errors, &name);
            user.name = name;
        }
        if let Some(email) = self.email {
            if let Some(email) = validate_email(&mut errors, &email) {
                user.email = email;
            }
        }
        errors.into_result()?;

        user.version = self.version;
        Ok(user)
    }
}

pub fn validate_name(errors: &mut ValidationErrors, name: &str) {
    errors.check(!name.is_empty(), "name", "must be provided");
    errors.check(
        name.len() <= NAME_MAX_BYTES,
        "name",
        format!("must not be more than {NAME_MAX_BYTES} bytes long"),
    );
}

pub fn validate_email(errors: &mut ValidationErrors, email: &str) -> Option<Email> {
    match Email::parse(email) {
        Ok(email) => Some(email),
        Err(e) => {
            errors.add("email", e.to_string());
            None
        }
    }
}

pub fn validate_password(errors: &mut ValidationErrors, password: &str) {
    errors.check(!password.is_empty(), "password", "must be provided");
    errors.check(
        password.len() >= PASSWORD_MIN_BYTES,
        "password",
        format!("must be at least {PASSWORD_MIN_BYTES} bytes long"),
    );
    errors.check(
        password.len() <= PASSWORD_MAX_BYTES,
        "password",
        format!("must not be more than {PASSWORD_MAX_BYTES} bytes long"),
    );
}
