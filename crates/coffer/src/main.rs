// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coffer - an envelope-encrypted, multi-bearer secrets vault.
//!
//! This is the operator CLI. Every command prints a JSON response envelope on
//! stdout and exits non-zero when `success` is false.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Coffer - an envelope-encrypted, multi-bearer secrets vault.
#[derive(Parser, Debug)]
#[command(name = "coffer", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Administer bearers (requires the admin credential).
    Bearer {
        /// Admin credential, compared against `vault.admin_token`.
        #[arg(long, env = "COFFER_ADMIN_TOKEN", hide_env_values = true)]
        admin_token: String,

        #[command(subcommand)]
        action: BearerAction,
    },
    /// Store and read secrets as a bearer.
    Secret {
        /// Bearer token issued by `coffer bearer create`.
        #[arg(long, env = "COFFER_TOKEN", hide_env_values = true)]
        token: String,

        #[command(subcommand)]
        action: SecretAction,
    },
}

#[derive(Subcommand, Debug)]
enum BearerAction {
    /// Create a bearer and print its token (shown only once).
    Create {
        /// Human-readable label.
        name: String,
    },
    /// List all bearers, revoked ones included.
    List,
    /// Revoke a bearer by id.
    Revoke {
        /// Bearer id as printed by `create` or `list`.
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum SecretAction {
    /// Store a secret. Reads the value from stdin unless `--value` is given.
    Put {
        name: String,
        #[arg(long)]
        value: Option<String>,
    },
    /// Print a secret's value.
    Get { name: String },
    /// List secret names.
    List,
    /// Delete a secret.
    Delete { name: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => coffer_config::load_and_validate_path(path),
        None => coffer_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            coffer_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    let code = match commands::run(cli.command, &config).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("coffer: {e}");
            1
        }
    };
    std::process::exit(code);
}

/// Logs go to stderr; stdout carries only the JSON envelope.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "coffer={log_level},coffer_vault={log_level},coffer_storage={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
