//! Command-line interface for thesis-refs.
//!
//! This module is CLI glue only: argument parsing, collaborator construction
//! and printing. Every rule about references lives in `thesis-refs-core`.
//!
//! `parse`, `scan` and `scan-agent` work offline. Every other command takes
//! `--config` and talks to Supabase (and, for `analyze`, Langflow). `watch`
//! runs until Ctrl-C or `--seconds` elapse.
//!
//! For programmatic and integration use, call [`run`] with a constructed [`Cli`].

use crate::document::read_document;
use crate::langflow::LangflowClient;
use crate::load_config::load_config;
use crate::supabase::SupabaseClient;
use crate::watch::autosave_document;
use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{ArgGroup, Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thesis_refs_core::agent_output::scan_agent_output;
use thesis_refs_core::analysis::analyze_document;
use thesis_refs_core::autosave::AutoSaveSession;
use thesis_refs_core::chunk::{load_document, save_document};
use thesis_refs_core::citation::{parse_citation, validate_reference};
use thesis_refs_core::config::AppConfig;
use thesis_refs_core::contract::{Reference, ReferenceFilter, ReferenceStore};
use thesis_refs_core::export::{export_bibliography, export_file_name};
use thesis_refs_core::reconcile::{
    add_reference, delete_reference, delete_references, reconcile, sync_usage, AddOutcome,
    SurnameContainment,
};
use thesis_refs_core::scan::{html_to_plain_text, scan_document};

/// Manage a thesis bibliography: parse, scan, reconcile and export APA references.
#[derive(Parser)]
#[clap(
    name = "thesis-refs",
    version,
    about = "Parse, scan and reconcile APA references for a thesis document"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse one APA citation and print the resulting record as JSON
    Parse {
        citation: String,
    },
    /// Scan a document (.html, .txt, .md) for references
    Scan {
        #[clap(long)]
        file: PathBuf,
    },
    /// Scan saved agent output (markdown) for suggested references
    ScanAgent {
        #[clap(long)]
        file: PathBuf,
    },
    /// Validate and store one manually entered citation
    Add {
        #[clap(long)]
        config: PathBuf,
        citation: String,
    },
    /// Scan a document, reconcile its references and store its content
    Extract {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        file: PathBuf,
    },
    /// Store a document's content without touching references
    Save {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        file: PathBuf,
    },
    /// Watch a document file and auto-save it to the store as it changes
    Watch {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        file: PathBuf,
        /// Poll interval in milliseconds
        #[clap(long, default_value_t = 500)]
        poll_ms: u64,
        /// Stop after this many seconds instead of on Ctrl-C
        #[clap(long)]
        seconds: Option<u64>,
    },
    /// Re-derive every reference's in-document flag from the stored document
    Sync {
        #[clap(long)]
        config: PathBuf,
    },
    /// Write the bibliography as plain text into a directory
    Export {
        #[clap(long)]
        config: PathBuf,
        /// Directory the export file is written to
        #[clap(long)]
        output: PathBuf,
        /// Document name used for the export file name
        #[clap(long, default_value = "thesis")]
        name: String,
    },
    /// Run the structure, style and citation agents over the stored document
    Analyze {
        #[clap(long)]
        config: PathBuf,
        /// Store the citation agent's suggestions
        #[clap(long)]
        apply: bool,
    },
    /// Delete one reference or a group of references
    #[clap(group(ArgGroup::new("target").required(true).args(["id", "used", "unused", "all"])))]
    Delete {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        id: Option<String>,
        /// Every reference cited in the document
        #[clap(long)]
        used: bool,
        /// Every reference not cited in the document
        #[clap(long)]
        unused: bool,
        #[clap(long)]
        all: bool,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn store_for(config: &AppConfig) -> Result<SupabaseClient> {
    SupabaseClient::new(&config.store).map_err(|e| anyhow!("Cannot reach reference store: {e}"))
}

/// Write `content` atomically as `dir/<file_name>`.
pub fn write_export(dir: &Path, file_name: &str, content: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let target = dir.join(file_name);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.persist(&target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(target)
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Parse { citation } => {
            let reference = parse_citation(&citation);
            if let Err(e) = validate_reference(&reference) {
                tracing::warn!(reason = %e, "Parsed citation would be rejected on add");
            }
            print_json(&reference)
        }
        Commands::Scan { file } => {
            let document = read_document(&file)?;
            let found: Vec<Reference> = scan_document(&document.plain_text).into_values().collect();
            tracing::info!(command = "scan", found = found.len(), "Scan complete");
            print_json(&found)
        }
        Commands::ScanAgent { file } => {
            let markdown = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read agent output {}", file.display()))?;
            print_json(&scan_agent_output(&markdown))
        }
        Commands::Add { config, citation } => {
            let config = load_config(config)?;
            let store = store_for(&config)?;
            match add_reference(&store, &config.owner_id, &citation, &SurnameContainment).await? {
                AddOutcome::Inserted(reference) => {
                    println!("Added {} ({})", reference.key(), reference.id.unwrap_or_default());
                }
                AddOutcome::AlreadyPresent(reference) => {
                    println!("Already in bibliography: {}", reference.key());
                }
            }
            Ok(())
        }
        Commands::Extract { config, file } => {
            let config = load_config(config)?;
            let store = store_for(&config)?;
            let document = read_document(&file)?;
            let found: Vec<Reference> = scan_document(&document.plain_text).into_values().collect();
            let report = reconcile(&store, &config.owner_id, &found, &SurnameContainment)
                .await
                .map_err(|e| anyhow!("Reconciliation failed: {e}"))?;
            save_document(&store, &config.owner_id, &document.content, config.chunk_size)
                .await
                .map_err(|e| anyhow!("Saving document failed: {e}"))?;
            tracing::info!(command = "extract", ?report, "Extraction complete");
            println!(
                "Found {} references: {} inserted, {} marked as used, {} unchanged",
                found.len(),
                report.inserted,
                report.flagged,
                report.unchanged
            );
            Ok(())
        }
        Commands::Save { config, file } => {
            let config = load_config(config)?;
            let store = store_for(&config)?;
            let document = read_document(&file)?;
            let chunks = save_document(&store, &config.owner_id, &document.content, config.chunk_size)
                .await
                .map_err(|e| anyhow!("Saving document failed: {e}"))?;
            println!("Saved document in {chunks} chunks");
            Ok(())
        }
        Commands::Watch {
            config,
            file,
            poll_ms,
            seconds,
        } => {
            let config = load_config(config)?;
            let store = Arc::new(store_for(&config)?);
            let stop = async move {
                match seconds {
                    Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                    None => {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            tracing::warn!(error = %e, "Cannot listen for Ctrl-C, stopping watch");
                        }
                    }
                }
            };
            println!("Watching {}", file.display());
            let (changes, summary) = autosave_document(
                store,
                &config.owner_id,
                config.chunk_size,
                AutoSaveSession::from_config(&config.autosave),
                &file,
                Duration::from_millis(poll_ms.max(1)),
                stop,
            )
            .await?;
            println!(
                "Saw {changes} changes: {} saves, {} failed",
                summary.saves, summary.failures
            );
            Ok(())
        }
        Commands::Sync { config } => {
            let config = load_config(config)?;
            let store = store_for(&config)?;
            let html = load_document(&store, &config.owner_id)
                .await
                .map_err(|e| anyhow!("Loading document failed: {e}"))?;
            let updated = sync_usage(&store, &config.owner_id, &html_to_plain_text(&html))
                .await
                .map_err(|e| anyhow!("Sync failed: {e}"))?;
            println!("Updated {updated} references");
            Ok(())
        }
        Commands::Export { config, output, name } => {
            let config = load_config(config)?;
            let store = store_for(&config)?;
            let references = store
                .select(&ReferenceFilter::owner(&config.owner_id))
                .await
                .map_err(|e| anyhow!("Loading references failed: {e}"))?;
            let text = export_bibliography(&references, Local::now().date_naive());
            let path = write_export(&output, &export_file_name(&name), &text)?;
            println!("Exported {} references to {}", references.len(), path.display());
            Ok(())
        }
        Commands::Analyze { config, apply } => {
            let config = load_config(config)?;
            let store = store_for(&config)?;
            let agent = LangflowClient::new(&config.agents)?;
            let html = load_document(&store, &config.owner_id)
                .await
                .map_err(|e| anyhow!("Loading document failed: {e}"))?;
            let stored = store
                .select(&ReferenceFilter::owner(&config.owner_id))
                .await
                .map_err(|e| anyhow!("Loading references failed: {e}"))?;
            let report = analyze_document(&agent, &config.agents, &html_to_plain_text(&html), &stored).await?;

            println!("## Structure\n\n{}\n", report.structure);
            println!("## Style\n\n{}\n", report.style);
            println!("## Citations\n\n{}\n", report.citations);
            println!("{} suggested references", report.suggestions.len());
            if apply && !report.suggestions.is_empty() {
                let applied = reconcile(&store, &config.owner_id, &report.suggestions, &SurnameContainment)
                    .await
                    .map_err(|e| anyhow!("Storing suggestions failed: {e}"))?;
                println!("Stored {} new suggestions", applied.inserted);
            }
            Ok(())
        }
        Commands::Delete {
            config,
            id,
            used,
            unused,
            all,
        } => {
            let config = load_config(config)?;
            let store = store_for(&config)?;
            let deleted = if let Some(id) = id {
                delete_reference(&store, &id)
                    .await
                    .map_err(|e| anyhow!("Delete failed: {e}"))?;
                1
            } else {
                let in_document = match (used, unused, all) {
                    (true, _, _) => Some(true),
                    (_, true, _) => Some(false),
                    _ => None,
                };
                delete_references(&store, &config.owner_id, in_document)
                    .await
                    .map_err(|e| anyhow!("Delete failed: {e}"))?
            };
            println!("Deleted {deleted} references");
            Ok(())
        }
    }
}
