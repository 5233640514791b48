//! Operating-system randomness.
//!
//! Every secret the server mints (activation tokens, CSRF tokens, CSP nonces)
//! comes from here. A failing entropy source is an error for the caller to
//! report, never a panic.

use rand::TryRngCore;
use rand::rngs::OsRng;

#[derive(Debug, thiserror::Error)]
#[error("operating system random source failed: {0}")]
pub struct RandomnessError(#[from] rand::rand_core::OsError);

/// Returns `N` bytes from the OS CSPRNG.
///
/// # Errors
///
/// Returns `RandomnessError` if the OS source cannot be read.
pub fn bytes<const N: usize>() -> Result<[u8; N], RandomnessError> {
    let mut buf = [0u8; N];
    OsRng.try_fill_bytes(&mut buf)?;
    Ok(buf)
}
