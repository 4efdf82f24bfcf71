// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `foghornd secret`: manage the encrypted secret store.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use foghorn_storage::{master_key_from_env, SecretStore};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;

/// Environment variable naming the secret store file
const STORE_PATH_ENV: &str = "FOGHORN_SECRET_STORE_FILE";

#[derive(Args)]
pub struct SecretArgs {
    /// Path to the encrypted secret store file
    #[arg(long = "store", visible_alias = "secret-store-file")]
    store: Option<PathBuf>,

    /// Path to a configuration file naming the secret store
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Secret value (avoid this flag in shared environments; prefer stdin)
    #[arg(long = "value")]
    value: Option<String>,

    #[command(subcommand)]
    command: SecretCommand,
}

#[derive(Subcommand)]
enum SecretCommand {
    /// List stored secret keys
    List,
    /// Store a secret (value from --value or stdin)
    Set { key: String },
    /// Replace a secret (value from --value or stdin)
    Rotate { key: String },
    /// Delete a secret
    Delete { key: String },
}

pub fn run(args: SecretArgs) -> Result<()> {
    let store_path = resolve_store_path(args.store, config_store_path(args.config.as_deref()));
    let master_key = master_key_from_env()?;
    let store = SecretStore::new(&store_path, master_key)?;

    match args.command {
        SecretCommand::List => {
            for key in store.list_keys()? {
                println!("{key}");
            }
        }
        SecretCommand::Set { key } | SecretCommand::Rotate { key } => {
            let value = match args.value {
                Some(value) => value,
                None => read_value_from_stdin()?,
            };
            if value.is_empty() {
                bail!("secret value cannot be empty");
            }
            store.set(&key, &value)?;
            println!("stored secret key: {key}");
        }
        SecretCommand::Delete { key } => {
            if store.delete(&key)? {
                println!("deleted secret key: {key}");
            } else {
                println!("secret key not found: {key}");
            }
        }
    }
    Ok(())
}

/// Store path resolution order: CLI flag, config file, environment
/// variable, default under the user's config directory.
pub fn resolve_store_path(cli_path: Option<PathBuf>, config_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }
    if let Some(path) = config_path {
        return path;
    }
    if let Some(path) = std::env::var_os(STORE_PATH_ENV) {
        let trimmed = path.to_string_lossy().trim().to_string();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home)
            .join(".config")
            .join("foghorn")
            .join("secrets.enc"),
        _ => PathBuf::from(".foghorn-secrets.enc"),
    }
}

fn config_store_path(config_path: Option<&std::path::Path>) -> Option<PathBuf> {
    let config = foghorn_config::load(config_path?).ok()?;
    config.secret_store_file
}

fn read_value_from_stdin() -> Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        bail!("no stdin provided; pipe a secret value or use --value");
    }
    let mut value = String::new();
    stdin
        .read_to_string(&mut value)
        .context("reading secret from stdin")?;
    Ok(value.trim().to_string())
}

#[cfg(test)]
#[path = "secret_cli_tests.rs"]
mod tests;
