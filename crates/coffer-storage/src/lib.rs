// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite record store for the Coffer secrets vault.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single
//! background connection thread via `tokio-rusqlite`, and typed operations on
//! the `bearers` and `secrets` tables. Rows hold only ciphertext, nonces,
//! salts and token hashes.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{now_timestamp, Database};
pub use models::*;
