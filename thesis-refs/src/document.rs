//! Document source: reads a thesis file into its stored form and plain text.
//!
//! `.html`/`.htm` files are stored as-is. `.txt`/`.md` files are stored as
//! escaped `<p>` paragraphs, one per non-empty line. Other formats must be
//! converted to HTML before they reach this crate.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use thesis_refs_core::scan::{escape_html, html_to_plain_text};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    /// Serialized HTML kept in the chunk store.
    pub content: String,
    /// Plain-text projection the scanners run on.
    pub plain_text: String,
}

impl LoadedDocument {
    pub fn from_html(html: String) -> Self {
        let plain_text = html_to_plain_text(&html);
        Self {
            content: html,
            plain_text,
        }
    }

    pub fn from_text(text: &str) -> Self {
        let content = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| format!("<p>{}</p>", escape_html(line)))
            .collect::<String>();
        Self::from_html(content)
    }
}

pub fn read_document(path: &Path) -> Result<LoadedDocument> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;

    let document = match extension.as_str() {
        "html" | "htm" => LoadedDocument::from_html(raw),
        "txt" | "md" => LoadedDocument::from_text(&raw),
        other => bail!(
            "Unsupported document type {other:?} for {}; convert it to HTML or plain text first",
            path.display()
        ),
    };
    info!(
        path = %path.display(),
        stored_chars = document.content.chars().count(),
        text_chars = document.plain_text.chars().count(),
        "Document loaded"
    );
    Ok(document)
}
