// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record types persisted by this crate.
//!
//! Defined in `coffer-core` so the vault manager can use them without
//! depending on SQLite; re-exported here for convenience.

pub use coffer_core::types::{BearerRecord, SecretRecord, StoreAction};
