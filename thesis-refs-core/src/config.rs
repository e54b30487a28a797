use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::chunk::CHUNK_SIZE;

/// Full application configuration, as read from YAML.
///
/// Secrets (`store.api_key`, `agents.token`) are never deserialized from the
/// file; the loader injects them from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Owner of every reference and chunk this process touches.
    pub owner_id: String,
    pub store: StoreConfig,
    pub agents: AgentsConfig,
    #[serde(default)]
    pub autosave: AutoSaveConfig,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    #[serde(default = "default_references_table")]
    pub references_table: String,
    #[serde(default = "default_chunks_table")]
    pub chunks_table: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    pub base_url: String,
    #[serde(default = "default_structure_flow")]
    pub structure_flow: String,
    #[serde(default = "default_style_flow")]
    pub style_flow: String,
    #[serde(default = "default_citations_flow")]
    pub citations_flow: String,
    #[serde(skip)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSaveConfig {
    #[serde(default = "default_quiet_period_secs")]
    pub quiet_period_secs: u64,
    #[serde(default = "default_force_save_secs")]
    pub force_save_secs: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            quiet_period_secs: default_quiet_period_secs(),
            force_save_secs: default_force_save_secs(),
        }
    }
}

impl AutoSaveConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_secs(self.quiet_period_secs)
    }

    pub fn force_save(&self) -> Duration {
        Duration::from_secs(self.force_save_secs)
    }
}

fn default_chunk_size() -> usize {
    CHUNK_SIZE
}
fn default_references_table() -> String {
    "references".to_string()
}
fn default_chunks_table() -> String {
    "document_chunks".to_string()
}
fn default_structure_flow() -> String {
    "structure".to_string()
}
fn default_style_flow() -> String {
    "style".to_string()
}
fn default_citations_flow() -> String {
    "citations".to_string()
}
fn default_quiet_period_secs() -> u64 {
    3
}
fn default_force_save_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn trace_loaded(&self) {
        info!(
            owner_id = %self.owner_id,
            store_url = %self.store.url,
            agents_url = %self.agents.base_url,
            chunk_size = self.chunk_size,
            store_key_set = self.store.api_key.is_some(),
            agent_token_set = self.agents.token.is_some(),
            "Loaded AppConfig"
        );
        debug!(
            references_table = %self.store.references_table,
            chunks_table = %self.store.chunks_table,
            autosave = ?self.autosave,
            "AppConfig details"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_sections() {
        let cfg: AppConfig = serde_json::from_value(serde_json::json!({
            "owner_id": "u1",
            "store": { "url": "http://localhost:54321" },
            "agents": { "base_url": "http://localhost:7860" }
        }))
        .unwrap();
        assert_eq!(cfg.chunk_size, 4000);
        assert_eq!(cfg.store.references_table, "references");
        assert_eq!(cfg.agents.citations_flow, "citations");
        assert_eq!(cfg.autosave.quiet_period(), Duration::from_secs(3));
        assert_eq!(cfg.autosave.force_save(), Duration::from_secs(30));
        assert!(cfg.store.api_key.is_none());
    }

    #[test]
    fn secrets_are_not_read_from_the_file() {
        let cfg: AppConfig = serde_json::from_value(serde_json::json!({
            "owner_id": "u1",
            "store": { "url": "x", "api_key": "leaked" },
            "agents": { "base_url": "y", "token": "leaked" }
        }))
        .unwrap();
        assert!(cfg.store.api_key.is_none());
        assert!(cfg.agents.token.is_none());
    }
}
