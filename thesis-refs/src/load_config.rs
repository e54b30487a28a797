//! `load_config`: reads the YAML configuration and injects secrets from the environment.
//!
//! The file never holds secrets. `SUPABASE_KEY` and `LANGFLOW_TOKEN` are read
//! from the environment here and left as `None` when unset; commands that need
//! a collaborator fail later with a clear message.
//!
//! # Errors
//! Every failure is an `anyhow::Error` naming the file, surfaced at the CLI.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::Path;
use thesis_refs_core::config::AppConfig;
use tracing::{error, info, warn};

pub const STORE_KEY_ENV: &str = "SUPABASE_KEY";
pub const AGENT_TOKEN_ENV: &str = "LANGFLOW_TOKEN";

fn secret_from_env(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            warn!(var = name, "Secret not set in environment");
            None
        }
    }
}

/// Load `path` into an [`AppConfig`] and attach environment secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref)
        .map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            e
        })
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;

    let mut config: AppConfig = serde_yaml::from_str(&content)
        .map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            e
        })
        .with_context(|| format!("Failed to parse config YAML {}", path_ref.display()))?;

    if config.owner_id.trim().is_empty() {
        bail!("owner_id must not be empty in {}", path_ref.display());
    }
    if config.chunk_size == 0 {
        bail!("chunk_size must be at least 1 in {}", path_ref.display());
    }

    config.store.api_key = secret_from_env(STORE_KEY_ENV);
    config.agents.token = secret_from_env(AGENT_TOKEN_ENV);
    config.trace_loaded();
    Ok(config)
}
