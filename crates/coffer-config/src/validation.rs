// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde attributes cannot express: non-empty paths,
//! credential lengths, share counts and log levels.

use crate::diagnostic::ConfigError;
use crate::model::CofferConfig;

/// Shortest admin credential accepted.
pub const MIN_ADMIN_TOKEN_LEN: usize = 16;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CofferConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.vault.key_share_count == 1 {
        fail("vault.key_share_count must be 0 (disabled) or at least 2, got 1".to_string());
    }

    if let Some(token) = &config.vault.admin_token {
        if token.chars().count() < MIN_ADMIN_TOKEN_LEN {
            fail(format!(
                "vault.admin_token must be at least {MIN_ADMIN_TOKEN_LEN} characters"
            ));
        }
    }

    if config.vault.master_passphrase.is_some() && config.vault.key_share_count >= 2 {
        fail(
            "vault.master_passphrase and vault.key_share_count are mutually exclusive; \
             configure one way of supplying the passphrase"
                .to_string(),
        );
    }

    if let Some(passphrase) = &config.vault.master_passphrase {
        if passphrase.is_empty() {
            fail("vault.master_passphrase must not be empty when set".to_string());
        }
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(format!(
            "logging.level `{}` is not one of: {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
