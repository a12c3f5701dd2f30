//! `identity show`: inspect the file-backed visitor identity.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use coherence_core::identity::{FileIdentityStore, IdentitySession};
use coherence_core::traits::LocalIdentityStore;
use coherence_core::types::VisitorIdentity;
use coherence_core::{Config, CoreResult};

use super::OutputFormat;
use crate::error::{exit_code_for_error, CliExitCode};

/// Identity subcommands
#[derive(Subcommand, Debug)]
pub enum IdentityCommands {
    /// Show the stored visitor identity
    Show(ShowArgs),
}

/// Arguments for `identity show`
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Identity directory. Falls back to `identity.storage_dir`.
    #[arg(long, env = "COHERENCE_IDENTITY_DIR")]
    pub dir: Option<PathBuf>,

    /// Create an identity if none is stored
    #[arg(long)]
    pub create: bool,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct ShowResponse {
    found: bool,
    created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    visitor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_prefix: Option<String>,
}

/// Handle identity command dispatch
pub fn handle_identity_command(cmd: IdentityCommands, config: &Config) -> i32 {
    match cmd {
        IdentityCommands::Show(args) => show_command(args, config),
    }
}

/// Execute `identity show`.
///
/// # Exit Codes
/// - 0: shown, or nothing stored
/// - 1: no directory configured, or the store could not be read
/// - 2: the stored blob is corrupt
pub fn show_command(args: ShowArgs, config: &Config) -> i32 {
    let Some(dir) = args.dir.clone().or_else(|| config.identity.storage_dir.clone()) else {
        eprintln!("Error: no identity directory (pass --dir or set identity.storage_dir)");
        return CliExitCode::Warning.into();
    };

    let store = Arc::new(FileIdentityStore::new(dir));
    match load(store, &config.identity.storage_key, args.create) {
        Ok(response) => {
            output(&response, args.format);
            CliExitCode::Success.into()
        }
        Err(e) => {
            warn!(error = %e, "identity show failed");
            eprintln!("Error: {}", e);
            exit_code_for_error(&e).into()
        }
    }
}

fn load(store: Arc<FileIdentityStore>, key: &str, create: bool) -> CoreResult<ShowResponse> {
    let existing = match store.read(key)? {
        Some(blob) => Some(serde_json::from_str::<VisitorIdentity>(&blob)?),
        None => None,
    };

    let (identity, created) = match existing {
        Some(identity) => (Some(identity), false),
        None if create => {
            let identity = IdentitySession::new(store, key).get_or_create()?;
            info!(visitor_id = %identity.visitor_id, "Created visitor identity");
            (Some(identity), true)
        }
        None => (None, false),
    };

    Ok(ShowResponse {
        found: identity.is_some(),
        created,
        token_prefix: identity
            .as_ref()
            .map(|i| i.visitor_token.chars().take(8).collect()),
        visitor_id: identity.map(|i| i.visitor_id),
    })
}

fn output(response: &ShowResponse, format: OutputFormat) {
    match format {
        OutputFormat::Text => match &response.visitor_id {
            Some(id) => {
                println!("Visitor: {}", id);
                if let Some(prefix) = &response.token_prefix {
                    println!("Token:   {}...", prefix);
                }
                if response.created {
                    println!("(newly created)");
                }
            }
            None => println!("No visitor identity stored"),
        },
        OutputFormat::Json => match serde_json::to_string(response) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: failed to serialize output: {}", e),
        },
    }
}
