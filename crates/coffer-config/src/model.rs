// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Coffer.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Coffer configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CofferConfig {
    /// Record store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Master passphrase, admin credential and key-share settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// SQLite record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("coffer").join("coffer.db").display().to_string())
        .unwrap_or_else(|| "coffer.db".to_string())
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Vault credentials.
///
/// The passphrase and admin token are never serialized back out and are
/// redacted from `Debug` output. Normally they arrive through
/// `COFFER_VAULT_MASTER_PASSPHRASE` and `COFFER_VAULT_ADMIN_TOKEN`.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Server master passphrase. `None` disables the vault.
    #[serde(default, skip_serializing)]
    pub master_passphrase: Option<String>,

    /// Credential required for bearer administration. `None` rejects all admin calls.
    #[serde(default, skip_serializing)]
    pub admin_token: Option<String>,

    /// Number of key shares to prompt for at startup (0 disables prompting).
    #[serde(default)]
    pub key_share_count: usize,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field(
                "master_passphrase",
                &self.master_passphrase.as_ref().map(|_| "[REDACTED]"),
            )
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[REDACTED]"))
            .field("key_share_count", &self.key_share_count)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_debug_redacts_credentials() {
        let vault = VaultConfig {
            master_passphrase: Some("correct horse battery staple".into()),
            admin_token: Some("admin-token-0123456789".into()),
            key_share_count: 0,
        };
        let rendered = format!("{vault:?}");
        assert!(!rendered.contains("horse"));
        assert!(!rendered.contains("admin-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn credentials_are_not_serialized() {
        let config = CofferConfig {
            vault: VaultConfig {
                master_passphrase: Some("smp".into()),
                admin_token: Some("adm".into()),
                key_share_count: 2,
            },
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("master_passphrase"));
        assert!(!json.contains("admin_token"));
        assert!(json.contains("key_share_count"));
    }

    #[test]
    fn default_database_path_ends_with_file_name() {
        assert!(StorageConfig::default().database_path.ends_with("coffer.db"));
    }
}
