// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./coffer.toml` > `~/.config/coffer/coffer.toml` > `/etc/coffer/coffer.toml`
//! with environment variable overrides via the `COFFER_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CofferConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/coffer/coffer.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "coffer.toml";

/// Prefix of every environment override.
const ENV_PREFIX: &str = "COFFER_";

/// Config sections that may be overridden from the environment.
const ENV_SECTIONS: [&str; 3] = ["storage", "vault", "logging"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/coffer/coffer.toml` (system-wide)
/// 3. `~/.config/coffer/coffer.toml` (user XDG config)
/// 4. `./coffer.toml` (local directory)
/// 5. `COFFER_*` environment variables
pub fn load_config() -> Result<CofferConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no environment).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<CofferConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CofferConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CofferConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CofferConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the standard hierarchy (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CofferConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/coffer/coffer.toml`, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("coffer").join(LOCAL_CONFIG_FILE))
}

/// Environment provider mapping `COFFER_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `split("_")` because keys such as
/// `master_passphrase` contain underscores. Variables outside the known
/// sections (e.g. the CLI's `COFFER_TOKEN`) are filtered out so they do not
/// trip `deny_unknown_fields`.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX)
        .filter(|key| section_key(key.as_str()).is_some())
        .map(|key| {
            section_key(key.as_str())
                .unwrap_or_else(|| key.as_str().to_ascii_lowercase())
                .into()
        })
}

/// `["vault", "admin_token"]` -> `COFFER_VAULT_ADMIN_TOKEN`, the inverse of [`section_key`].
pub(crate) fn env_var_name(path: &[String]) -> String {
    format!("{ENV_PREFIX}{}", path.join("_").to_ascii_uppercase())
}

/// `VAULT_ADMIN_TOKEN` -> `vault.admin_token`; `None` outside the known sections.
fn section_key(env_key: &str) -> Option<String> {
    let lowered = env_key.to_ascii_lowercase();
    ENV_SECTIONS.iter().find_map(|section| {
        lowered
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|rest| !rest.is_empty())
            .map(|rest| format!("{section}.{rest}"))
    })
}
