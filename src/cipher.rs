//! Token encryption boundary
//!
//! Access and refresh tokens are encrypted before they touch the database.
//! The engine does not ship an encryption scheme of its own; deployments
//! plug one in through [`TokenCipher`], and development setups fall back
//! to [`NoOpCipher`], which stores tokens verbatim.

use crate::error::Result;

/// Encrypts tokens on their way into the store and decrypts them on the
/// way out.
///
/// The only contract is the round trip: `decrypt(encrypt(t)) == t`.
/// Failures surface as credential errors for the affected account.
pub trait TokenCipher: Send + Sync {
    /// Encrypt a token for storage
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Decrypt a stored token
    fn decrypt(&self, ciphertext: &str) -> Result<String>;

    /// Name of the cipher implementation, for logs
    fn name(&self) -> &'static str;
}

/// Pass-through cipher used when no real cipher is configured
///
/// Stores tokens as-is. Acceptable for local development against a
/// throwaway database; production deployments supply their own
/// [`TokenCipher`].
pub struct NoOpCipher;

impl TokenCipher for NoOpCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        Ok(ciphertext.to_string())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
