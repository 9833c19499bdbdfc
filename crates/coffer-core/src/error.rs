// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Coffer secrets vault.
//!
//! Two layers:
//! - [`CofferError`] is raised by the crypto primitives, the record store and
//!   the configuration loader. It may carry detail useful to operators.
//! - [`VaultError`] is the only error a vault manager operation returns. Its
//!   variants never distinguish a revoked bearer from an unknown one, nor a
//!   storage fault from a decryption failure.

use thiserror::Error;

/// Internal error type shared by the lower layers of Coffer.
#[derive(Debug, Error)]
pub enum CofferError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migrations).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A uniqueness or foreign key constraint rejected a write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// AEAD tag verification failed (wrong key, tampered data, or wrong nonce).
    #[error("authentication failure")]
    AuthenticationFailure,

    /// Crypto plumbing failure (RNG, key setup, corrupted key material).
    #[error("vault error: {0}")]
    Vault(String),

    /// Caller supplied an argument the operation cannot accept.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Outcome categories of a vault manager operation.
///
/// The display strings are the exact messages shown to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// No master passphrase was supplied at startup; the vault is disabled.
    #[error("vault not configured")]
    NotConfigured,

    /// Missing, unknown, or revoked bearer token, or a bad admin credential.
    #[error("Unauthorized")]
    Unauthorized,

    /// Rejected argument (empty or oversized name).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The named secret does not exist for this bearer.
    #[error("Secret '{0}' not found")]
    SecretNotFound(String),

    /// Revocation target is unknown or already revoked.
    #[error("Bearer not found or already revoked")]
    BearerNotFound,

    /// A concurrent write won a uniqueness race.
    #[error("conflicting write, retry the operation")]
    Conflict,

    /// Any other failure below the manager boundary.
    #[error("vault operation failed")]
    Failed,
}

impl From<CofferError> for VaultError {
    fn from(err: CofferError) -> Self {
        match err {
            CofferError::ConstraintViolation(_) => VaultError::Conflict,
            CofferError::InvalidInput(msg) => VaultError::InvalidInput(msg),
            _ => VaultError::Failed,
        }
    }
}
