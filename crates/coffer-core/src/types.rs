// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted record types shared by the store and the vault manager.
//!
//! Every byte field here is either ciphertext, a nonce, or a salt. Plaintext
//! keys, tokens and secret values never appear in a record.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One authorized caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerRecord {
    /// Opaque unique identifier (UUID v4).
    pub id: String,
    /// Hex SHA-256 of the bearer token. Unique across all bearers.
    pub token_hash: String,
    /// The bearer's KEK, sealed under the key derived from the SMP and `salt`.
    pub wrapped_kek: Vec<u8>,
    /// Nonce used to seal `wrapped_kek`.
    pub kek_nonce: Vec<u8>,
    /// Per-bearer salt for deriving the wrapping key from the SMP.
    pub salt: Vec<u8>,
    /// Human label.
    pub name: String,
    /// ISO 8601 UTC timestamp.
    pub created_at: String,
    /// Set once on revocation, never cleared.
    pub revoked_at: Option<String>,
}

impl BearerRecord {
    /// Whether this bearer has been revoked.
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// One named secret owned by exactly one bearer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub id: String,
    pub name: String,
    /// Owning bearer.
    pub bearer_id: String,
    /// Secret value sealed under the DEK.
    pub encrypted_value: Vec<u8>,
    pub value_nonce: Vec<u8>,
    /// The secret's DEK sealed under the owning bearer's KEK.
    pub wrapped_dek: Vec<u8>,
    pub dek_nonce: Vec<u8>,
    pub created_at: String,
    pub updated_at: String,
}

/// Whether a store created a new secret row or replaced an existing one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreAction {
    Created,
    Updated,
}
