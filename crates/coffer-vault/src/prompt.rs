// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master passphrase acquisition: configuration first, then key shares typed
//! at a TTY prompt.

use coffer_config::VaultConfig;
use coffer_core::CofferError;
use secrecy::SecretString;
use tracing::info;
use zeroize::Zeroizing;

use crate::crypto;

/// Resolve the server master passphrase.
///
/// Priority:
/// 1. `vault.master_passphrase` (usually `COFFER_VAULT_MASTER_PASSPHRASE`)
/// 2. `vault.key_share_count` shares read with `rpassword` and combined, when
///    stdin is a terminal
///
/// `Ok(None)` means no passphrase is available and the vault stays disabled.
pub fn resolve_master_passphrase(
    config: &VaultConfig,
) -> Result<Option<SecretString>, CofferError> {
    if let Some(passphrase) = config.master_passphrase.as_deref().filter(|p| !p.is_empty()) {
        return Ok(Some(SecretString::from(passphrase.to_string())));
    }

    if config.key_share_count < 2 {
        return Ok(None);
    }

    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        info!(
            shares = config.key_share_count,
            "stdin is not a terminal; key shares cannot be prompted for"
        );
        return Ok(None);
    }

    let mut shares: Vec<Zeroizing<String>> = Vec::with_capacity(config.key_share_count);
    for index in 1..=config.key_share_count {
        eprint!("Key share {index}/{}: ", config.key_share_count);
        let share = Zeroizing::new(
            rpassword::read_password()
                .map_err(|e| CofferError::Vault(format!("failed to read key share: {e}")))?,
        );
        if share.is_empty() {
            return Err(CofferError::InvalidInput("empty key share".to_string()));
        }
        shares.push(share);
    }

    let refs: Vec<&str> = shares.iter().map(|s| s.as_str()).collect();
    crypto::combine_key_shares(&refs).map(Some)
}
