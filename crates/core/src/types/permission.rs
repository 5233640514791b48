//! Permission codes and the per-request permission set.

use serde::{Deserialize, Serialize};

/// A permission code such as `products:write`.
///
/// Codes are opaque strings owned by the `permissions` table; the constants
/// below are the ones the server seeds and checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionCode(&'static str);

impl PermissionCode {
    pub const PRODUCTS_READ: Self = Self("products:read");
    pub const PRODUCTS_WRITE: Self = Self("products:write");
    pub const INVOICES_READ: Self = Self("invoices:read");
    pub const INVOICES_WRITE: Self = Self("invoices:write");

    /// Granted to every account at sign-up.
    pub const DEFAULTS: &'static [Self] = &[Self::PRODUCTS_READ];

    /// All codes known to this build.
    pub const ALL: &'static [Self] = &[
        Self::PRODUCTS_READ,
        Self::PRODUCTS_WRITE,
        Self::INVOICES_READ,
        Self::INVOICES_WRITE,
    ];

    /// Returns the code as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Looks up a known code by its string form.
    #[must_use]
    pub fn find(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.0 == code)
    }
}

impl std::fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// The set of permission codes held by one account, fetched fresh per request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(Vec<String>);

impl Permissions {
    #[must_use]
    pub const fn new(codes: Vec<String>) -> Self {
        Self(codes)
    }

    /// Whether the set contains `code`. An empty set contains nothing.
    #[must_use]
    pub fn includes(&self, code: PermissionCode) -> bool {
        self.0.iter().any(|c| c == code.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for Permissions {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
