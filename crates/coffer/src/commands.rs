// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand execution: open the store, build the vault, run one operation
//! and print its response envelope.

use coffer_config::CofferConfig;
use coffer_core::{CofferError, VaultError};
use coffer_storage::Database;
use coffer_vault::{envelope, resolve_master_passphrase, AdminScope, Vault};
use secrecy::SecretString;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::debug;
use zeroize::Zeroizing;

use crate::{BearerAction, Commands, SecretAction};

/// Run one command. Returns the envelope's `success` flag.
///
/// The store is checkpointed before returning, whether or not the command failed.
pub(crate) async fn run(command: Commands, config: &CofferConfig) -> Result<bool, CofferError> {
    let db = Database::open_with_timeout(
        &config.storage.database_path,
        config.storage.busy_timeout_ms,
    )
    .await?;

    let outcome = execute(&db, command, config).await;
    let closed = db.close().await;
    let output = outcome?;
    closed?;

    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|e| CofferError::Internal(format!("failed to render response: {e}")))?;
    println!("{rendered}");
    Ok(output.get("success").and_then(Value::as_bool).unwrap_or(false))
}

async fn execute(
    db: &Database,
    command: Commands,
    config: &CofferConfig,
) -> Result<Value, CofferError> {
    let passphrase = resolve_master_passphrase(&config.vault)?;
    let admin_token = config.vault.admin_token.clone().map(SecretString::from);
    let vault = Vault::new(db.clone(), passphrase, admin_token);
    dispatch(&vault, command).await
}

fn admin_scope<'a>(vault: &'a Vault, credential: &str) -> Result<AdminScope<'a>, VaultError> {
    vault.manager()?.admin(credential)
}

async fn dispatch(vault: &Vault, command: Commands) -> Result<Value, CofferError> {
    let output = match command {
        Commands::Bearer {
            admin_token,
            action,
        } => {
            let admin = admin_scope(vault, &admin_token);
            match action {
                BearerAction::Create { name } => match admin {
                    Ok(admin) => envelope(&admin.create_bearer(&name).await),
                    Err(e) => envelope::<()>(&Err(e)),
                },
                BearerAction::List => match admin {
                    Ok(admin) => envelope(&admin.list_bearers().await),
                    Err(e) => envelope::<()>(&Err(e)),
                },
                BearerAction::Revoke { id } => match admin {
                    Ok(admin) => envelope(&admin.revoke_bearer(&id).await),
                    Err(e) => envelope::<()>(&Err(e)),
                },
            }
        }
        Commands::Secret { token, action } => {
            let manager = match vault.manager() {
                Ok(manager) => manager,
                Err(e) => return Ok(envelope::<()>(&Err(e))),
            };
            match action {
                SecretAction::Put { name, value } => {
                    let value = match value {
                        Some(v) => Zeroizing::new(v),
                        None => read_value_from_stdin().await?,
                    };
                    envelope(&manager.store_secret(&token, &name, &value).await)
                }
                SecretAction::Get { name } => envelope(&manager.get_secret(&token, &name).await),
                SecretAction::List => envelope(&manager.list_secrets(&token).await),
                SecretAction::Delete { name } => {
                    envelope(&manager.delete_secret(&token, &name).await)
                }
            }
        }
    };
    Ok(output)
}

/// Read a secret value from stdin, dropping one trailing newline.
async fn read_value_from_stdin() -> Result<Zeroizing<String>, CofferError> {
    let mut buf = Zeroizing::new(String::new());
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .map_err(|e| CofferError::Internal(format!("failed to read value from stdin: {e}")))?;
    let trimmed = buf
        .strip_suffix('\n')
        .map(|s| s.strip_suffix('\r').unwrap_or(s))
        .unwrap_or(buf.as_str())
        .len();
    buf.truncate(trimmed);
    debug!(bytes = buf.len(), "secret value read from stdin");
    Ok(buf)
}
