//! Text scanner: finds references in a document's plain-text projection.
//!
//! Two passes run in order and the first write for a [`ReferenceKey`] wins:
//!
//! 1. full bibliographic entries, `García, R. (2021). Título. Revista.`
//! 2. in-text citations, `(García, 2021)`, `(García et al., 2021)` or the
//!    narrative `García (2021)`
//!
//! An in-text citation whose key was not claimed by a full entry produces a
//! record with [`CITATION_ONLY_TITLE`]. Finding nothing is an empty map.
//! Surnames may span several capitalised words (`Hernández Sampieri`).

use std::collections::BTreeMap;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::citation::ReferenceKey;
use crate::contract::Reference;

/// Title given to a reference known only from an in-text citation.
pub const CITATION_ONLY_TITLE: &str = "Citation extracted from text, full reference not found";

/// One capitalised word of a name, `García`, `O'Brien`, `Ruiz-Tagle`.
const NAME_WORD: &str = r"\p{Lu}[\p{L}'\-]+";

/// A surname of one or more capitalised words, `Hernández Sampieri`.
static SURNAME: Lazy<String> = Lazy::new(|| format!(r"{w}(?:\s+{w})*", w = NAME_WORD));

/// One surname, optionally followed by `, R. M.` style initials.
static AUTHOR_UNIT: Lazy<String> =
    Lazy::new(|| format!(r"{surname}(?:,\s*(?:\p{{Lu}}\.\s*)+)?", surname = SURNAME.as_str()));

/// One or more authors joined by `y` or `&`.
pub(crate) static AUTHOR_LIST: Lazy<String> = Lazy::new(|| {
    format!(r"{unit}(?:\s*(?:,\s*)?(?:y|&)\s+{unit})*", unit = AUTHOR_UNIT.as_str())
});

static FULL_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?P<author>{authors})\s*\((?P<year>\d{{4}})\)\.\s*(?P<title>[^.]+)\.\s*(?P<source>[^.]+)\.",
        authors = AUTHOR_LIST.as_str()
    ))
    .expect("valid regex")
});

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\((?P<surname>{surname})(?:\s+et\s+al\.)?,?\s*(?P<year>\d{{4}})\)",
        surname = SURNAME.as_str()
    ))
    .expect("valid regex")
});

static NARRATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?P<surname>{surname})(?:\s+et\s+al\.)?\s+\((?P<year>\d{{4}})\)",
        surname = SURNAME.as_str()
    ))
    .expect("valid regex")
});

/// Capitalised words that open a sentence or a section, never a surname.
const NOT_SURNAMES: &[&str] = &[
    "Además",
    "According",
    "Asimismo",
    "Bibliografía",
    "Bibliography",
    "Como",
    "Con",
    "En",
    "Finalmente",
    "Para",
    "Por",
    "References",
    "Referencias",
    "Según",
    "Sobre",
    "También",
    "Tras",
];

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip HTML tags to spaces, decode common entities and collapse whitespace.
pub fn html_to_plain_text(html: &str) -> String {
    let text = TAG.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Escape text for embedding in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Drop leading words such as `Según` or `Referencias` that the name
/// patterns pick up at the start of a sentence or after a heading.
fn strip_leading_non_surnames(name: &str) -> &str {
    let mut rest = name.trim_start();
    while let Some((word, tail)) = rest.split_once(char::is_whitespace) {
        if !NOT_SURNAMES.contains(&word) {
            break;
        }
        rest = tail.trim_start();
    }
    rest
}

/// Longest trailing word sequence of `surname` already keyed with `year`,
/// or `surname` itself when none is.
fn resolve_surname<'a>(
    surname: &'a str,
    year: &str,
    found: &BTreeMap<ReferenceKey, Reference>,
) -> &'a str {
    let mut rest = surname;
    loop {
        if found.contains_key(&ReferenceKey::new(rest, year)) {
            return rest;
        }
        match rest.split_once(char::is_whitespace) {
            Some((_, tail)) => rest = tail.trim_start(),
            None => return surname,
        }
    }
}

/// Scan plain text for references, deduplicated by `(surname, year)`.
///
/// In-text matches that start inside a full entry are part of that entry and
/// are not reported on their own.
pub fn scan_document(text: &str) -> BTreeMap<ReferenceKey, Reference> {
    let mut found: BTreeMap<ReferenceKey, Reference> = BTreeMap::new();
    let mut entries: Vec<Range<usize>> = Vec::new();

    for caps in FULL_REFERENCE.captures_iter(text) {
        if let Some(m) = caps.get(0) {
            entries.push(m.range());
        }
        let author = strip_leading_non_surnames(caps["author"].trim());
        let key = ReferenceKey::new(author, &caps["year"]);
        if found.contains_key(&key) {
            continue;
        }
        let mut reference = Reference::new(author, &caps["year"], caps["title"].trim());
        reference.source = Some(caps["source"].trim().to_string());
        reference.in_document = true;
        debug!(key = %key, "[SCAN] Full reference found");
        found.insert(key, reference);
    }

    for re in [&*PARENTHETICAL, &*NARRATIVE] {
        for caps in re.captures_iter(text) {
            let Some(m) = caps.get(0) else {
                continue;
            };
            if entries.iter().any(|entry| entry.contains(&m.start())) {
                continue;
            }
            let year = &caps["year"];
            let surname = resolve_surname(strip_leading_non_surnames(&caps["surname"]), year, &found);
            let key = ReferenceKey::new(surname, year);
            found.entry(key).or_insert_with_key(|key| {
                debug!(key = %key, "[SCAN] In-text citation without full reference");
                let mut reference = Reference::new(&key.surname, &key.year, CITATION_ONLY_TITLE);
                reference.in_document = true;
                reference
            });
        }
    }

    info!(count = found.len(), "[SCAN] Document scan complete");
    found
}
