//! Citation parser and reference identity.
//!
//! [`parse_citation`] turns one free-text APA line into a [`Reference`]. It is
//! total: input that does not fit the strict grammar still yields a record,
//! with the whole input as title. Callers decide acceptability with
//! [`validate_reference`].

use std::fmt;

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::contract::Reference;

/// Author used when the input has no recognisable author segment.
pub const UNKNOWN_AUTHOR: &str = "Unknown author";

// SURNAME, INITIALS (YEAR). TITLE. SOURCE
static STRICT_APA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^,]+),\s*([^(]+)\s*\((\d{4})\)\.\s*(.+?)\.\s*(.+)$").expect("valid regex")
});
static PAREN_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d{4})\)").expect("valid regex"));
static FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));
static AUTHOR_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",|&|\s+y\s+|\s+and\s+").expect("valid regex"));

/// Parse one APA-ish citation line. Never fails.
pub fn parse_citation(raw: &str) -> Reference {
    let text = raw.trim();

    let mut reference = match STRICT_APA.captures(text) {
        Some(caps) => {
            let mut r = Reference::new(caps[1].trim(), &caps[3], caps[4].trim());
            r.initials = Some(caps[2].trim().to_string());
            r.source = Some(caps[5].trim().to_string()).filter(|s| !s.is_empty());
            r
        }
        None => {
            debug!(input = raw, "Citation does not match strict APA, using fallback");
            let author = text
                .split_once('(')
                .map(|(before, _)| before.trim())
                .filter(|a| !a.is_empty())
                .unwrap_or(UNKNOWN_AUTHOR);
            let year = PAREN_YEAR
                .captures(text)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| Utc::now().year().to_string());
            Reference::new(author, year, raw)
        }
    };

    reference.id = Some(uuid::Uuid::new_v4().to_string());
    reference
}

/// First-listed surname of a free-text author list.
///
/// `"García, R. y López, M."` gives `"García"`; `"Smith & Doe"` gives `"Smith"`.
pub fn first_author_surname(author: &str) -> &str {
    let author = author.trim();
    match AUTHOR_SEPARATOR.find(author) {
        Some(m) => author[..m.start()].trim(),
        None => author,
    }
}

/// The `(surname, year)` pair that decides whether two references are the same.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceKey {
    pub surname: String,
    pub year: String,
}

impl ReferenceKey {
    pub fn new(author: &str, year: &str) -> Self {
        Self {
            surname: first_author_surname(author).to_string(),
            year: year.trim().to_string(),
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.surname, self.year)
    }
}

/// Why a reference was refused at the persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("author is empty or unknown")]
    UnknownAuthor,
    #[error("year {0:?} is not a four-digit year")]
    InvalidYear(String),
    #[error("title is empty")]
    EmptyTitle,
}

/// Gate applied before a manually entered reference is stored.
pub fn validate_reference(reference: &Reference) -> Result<(), ValidationError> {
    let author = reference.author.trim();
    if author.is_empty() || author.eq_ignore_ascii_case(UNKNOWN_AUTHOR) {
        return Err(ValidationError::UnknownAuthor);
    }
    if !FOUR_DIGITS.is_match(&reference.year) {
        return Err(ValidationError::InvalidYear(reference.year.clone()));
    }
    if reference.title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

/// In-text citation inserted into the editor, padded with spaces.
pub fn in_text_marker(author: &str, year: &str) -> String {
    format!(" ({}, {}) ", first_author_surname(author), year.trim())
}
