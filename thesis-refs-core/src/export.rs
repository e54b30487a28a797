//! Plain-text bibliography export.

use chrono::NaiveDate;

use crate::contract::Reference;

const RULE: &str = "==================================================";

/// One numbered line: `N. Author (Year). Title. Source. DOI`.
///
/// Missing parts are left out together with their separator. The DOI is
/// written as-is, without a closing period.
pub fn format_entry(number: usize, reference: &Reference) -> String {
    let mut line = format!(
        "{}. {} ({}).",
        number,
        reference.author.trim(),
        reference.year.trim()
    );
    for part in [Some(reference.title.as_str()), reference.source.as_deref()]
        .into_iter()
        .flatten()
    {
        let part = part.trim().trim_end_matches('.').trim_end();
        if !part.is_empty() {
            line.push(' ');
            line.push_str(part);
            line.push('.');
        }
    }
    if let Some(doi) = reference.doi_link.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        line.push(' ');
        line.push_str(doi);
    }
    line
}

/// Render the full export: banner, numbered entries, summary counts.
pub fn export_bibliography(references: &[Reference], generated_on: NaiveDate) -> String {
    let mut lines = vec![
        RULE.to_string(),
        "BIBLIOGRAPHY".to_string(),
        format!("Generated on {}", generated_on.format("%Y-%m-%d")),
        RULE.to_string(),
        String::new(),
    ];

    if references.is_empty() {
        lines.push("No references.".to_string());
    }
    lines.extend(
        references
            .iter()
            .enumerate()
            .map(|(i, reference)| format_entry(i + 1, reference)),
    );

    let used = references.iter().filter(|r| r.in_document).count();
    let suggested = references.iter().filter(|r| r.from_agent).count();
    lines.extend([
        String::new(),
        RULE.to_string(),
        format!("Total references: {}", references.len()),
        format!("Used in document: {used}"),
        format!("Suggested by agents: {suggested}"),
        RULE.to_string(),
    ]);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// `Bibliography_<name>.txt`, keeping letters, digits, `-` and `_` of the
/// document name's stem and turning anything else into `_`.
pub fn export_file_name(document_name: &str) -> String {
    let stem = match document_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => document_name,
    };
    let mut name: String = stem
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        name.push_str("document");
    }
    format!("Bibliography_{name}.txt")
}
