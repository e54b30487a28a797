//! Agent-output scanner: candidate references from LLM markdown.
//!
//! Agents answer with markdown tables (`| # | Autor (Año) | Título | Fuente | DOI |`)
//! or with list entries (`1. García, R. (2021) Título. Revista.`). Both are
//! recognised; every candidate is flagged `from_agent` and not `in_document`.
//! Candidates are not checked against the store here.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::citation::ReferenceKey;
use crate::contract::Reference;
use crate::scan::AUTHOR_LIST;

static TABLE_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*\|\s*\d+\s*\|(?P<author_year>[^|\n]+)\|(?P<title>[^|\n]+)\|(?P<source>[^|\n]*)\|(?P<doi>[^|\n]*)\|",
    )
    .expect("valid regex")
});

static AUTHOR_YEAR_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<author>.+?)\s*\((?P<year>\d{4})\)").expect("valid regex"));

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+").expect("valid regex"));

static LIST_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?P<author>{authors})\s*\((?P<year>\d{{4}})\)\.?\s*(?P<title>[^.]+)\.\s*(?P<source>[^.]+)(?:\.|$)",
        authors = AUTHOR_LIST.as_str()
    ))
    .expect("valid regex")
});

static DOI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://(?:dx\.)?doi\.org/\S+|\b10\.\d{4,9}/\S+").expect("valid regex")
});

/// Placeholder cell values agents use for "no DOI" / "no source".
fn cell_value(cell: &str) -> Option<String> {
    let value = cell.trim().trim_matches('*').trim();
    match value.to_lowercase().as_str() {
        "" | "-" | "—" | "n/a" | "na" | "no disponible" | "not available" => None,
        _ => Some(value.to_string()),
    }
}

fn agent_candidate(author: &str, year: &str, title: &str) -> Reference {
    let mut reference = Reference::new(author.trim(), year, title.trim());
    reference.from_agent = true;
    reference.in_document = false;
    reference
}

/// Extract suggested references from agent markdown.
///
/// Table rows are read first. A list entry is dropped when its
/// `(surname, year)` was already produced earlier in the same call.
pub fn scan_agent_output(markdown: &str) -> Vec<Reference> {
    let mut seen: HashSet<ReferenceKey> = HashSet::new();
    let mut candidates = Vec::new();

    for caps in TABLE_ROW.captures_iter(markdown) {
        let cell = caps["author_year"].replace('*', "");
        let Some(author_year) = AUTHOR_YEAR_CELL.captures(cell.trim()) else {
            debug!(cell = %cell.trim(), "[AGENT-SCAN] Table row without Author (Year) cell");
            continue;
        };
        let Some(title) = cell_value(&caps["title"]) else {
            continue;
        };
        let mut reference = agent_candidate(&author_year["author"], &author_year["year"], &title);
        reference.source = cell_value(&caps["source"]);
        reference.doi_link = cell_value(&caps["doi"]);
        if seen.insert(reference.key()) {
            candidates.push(reference);
        }
    }

    for line in markdown.lines() {
        if line.trim_start().starts_with('|') {
            continue;
        }
        let line = LIST_MARKER.replace(line, "").replace('*', "");
        let Some(caps) = LIST_ENTRY.captures(&line) else {
            continue;
        };
        let mut reference = agent_candidate(&caps["author"], &caps["year"], &caps["title"]);
        reference.source = cell_value(&caps["source"]);
        reference.doi_link = DOI.find(&line).map(|m| m.as_str().trim_end_matches('.').to_string());
        if seen.insert(reference.key()) {
            candidates.push(reference);
        } else {
            debug!(key = %reference.key(), "[AGENT-SCAN] Duplicate list entry dropped");
        }
    }

    info!(count = candidates.len(), "[AGENT-SCAN] Agent output scanned");
    candidates
}
