// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelope-encrypted, multi-bearer secrets vault.
//!
//! Each bearer owns a key-encryption key (KEK) wrapped under a key derived
//! from the server master passphrase and the bearer's salt. Each stored value
//! gets a fresh data-encryption key (DEK) wrapped under the owner's KEK.
//! Tokens are stored only as SHA-256 hashes.

pub mod crypto;
pub mod kdf;
pub mod manager;
pub mod prompt;
pub mod response;

pub use manager::{
    AdminScope, BearerListing, BearerSummary, DeletedSecret, IssuedBearer, RevealedSecret,
    RevokedBearer, SecretListing, SecretSummary, StoredSecret, Vault, VaultManager,
};
pub use prompt::resolve_master_passphrase;
pub use response::envelope;
