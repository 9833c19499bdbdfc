// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PBKDF2-HMAC-SHA256 key derivation from the server master passphrase.
//!
//! Every bearer has its own salt, so the same passphrase yields a different
//! wrapping key per bearer.

use std::num::NonZeroU32;

use coffer_core::CofferError;
use ring::pbkdf2;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::crypto::{self, Key};

/// PBKDF2 iteration count. Fixed; changing it orphans every wrapped KEK.
pub const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(600_000) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derive a 256-bit key from `passphrase` and `salt`.
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> Key {
    let mut out = Zeroizing::new([0u8; 32]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ITERATIONS,
        salt,
        passphrase,
        out.as_mut(),
    );
    out
}

/// [`derive_key`] on the blocking thread pool, keeping the async executor free.
pub async fn derive_key_blocking(
    passphrase: &SecretString,
    salt: &[u8],
) -> Result<Key, CofferError> {
    let passphrase = Zeroizing::new(passphrase.expose_secret().as_bytes().to_vec());
    let salt = salt.to_vec();
    tokio::task::spawn_blocking(move || derive_key(&passphrase, &salt))
        .await
        .map_err(|e| CofferError::Internal(format!("key derivation task failed: {e}")))
}

/// Generate a random salt for [`derive_key`].
pub fn generate_salt() -> Result<[u8; SALT_LEN], CofferError> {
    let mut salt = [0u8; SALT_LEN];
    crypto::fill_random(&mut salt)?;
    Ok(salt)
}
