// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types for the Coffer secrets vault.
//!
//! This crate holds the error taxonomy and the persisted record shapes shared
//! by the storage layer and the vault manager.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{CofferError, VaultError};
pub use types::{BearerRecord, SecretRecord, StoreAction};
