//! Reference store reconciliation: merges discovered references into the persisted set.
//!
//! This module owns every write the core makes to a [`ReferenceStore`]:
//!   - [`reconcile`] inserts unknown references and raises the `in_document`
//!     flag on known ones
//!   - [`sync_usage`] re-derives every stored `in_document` flag from the
//!     document text
//!   - [`add_reference`] is the manual-entry path: parse, validate, reconcile
//!   - [`delete_reference`] / [`delete_references`] remove records
//!
//! # Identity
//! Whether a candidate is already stored is decided by a [`ReferenceMatcher`].
//! The default [`SurnameContainment`] matches when the stored author text
//! contains the candidate's first surname and the years are equal. No case or
//! diacritic folding is applied.
//!
//! # Invariant
//! A match never rewrites author, title, source or DOI. Only flags change.
//!
//! # Error Handling
//! Store failures are logged and returned as-is; nothing is retried. Reads and
//! writes are not transactional, so concurrent runs for one owner can race.

use futures::future::try_join_all;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::citation::{first_author_surname, parse_citation, validate_reference, ValidationError};
use crate::contract::{Reference, ReferenceFilter, ReferencePatch, ReferenceStore, StoreError};

/// Decides whether a stored reference and a candidate are the same work.
pub trait ReferenceMatcher: Send + Sync {
    fn is_same(&self, stored: &Reference, candidate: &Reference) -> bool;
}

/// Stored author contains the candidate's first surname, and years are equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurnameContainment;

impl ReferenceMatcher for SurnameContainment {
    fn is_same(&self, stored: &Reference, candidate: &Reference) -> bool {
        let surname = first_author_surname(&candidate.author);
        !surname.is_empty() && stored.author.contains(surname) && stored.year == candidate.year
    }
}

/// Outcome of a [`reconcile`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Newly inserted records.
    pub inserted: usize,
    /// Existing records whose `in_document` flag was raised.
    pub flagged: usize,
    /// Candidates that matched and needed no write.
    pub unchanged: usize,
}

/// Merge `candidates` into the owner's stored references.
///
/// Candidates that match a stored record (or one inserted earlier in the same
/// call) never cause a second insert.
pub async fn reconcile<S, M>(
    store: &S,
    owner_id: &str,
    candidates: &[Reference],
    matcher: &M,
) -> Result<ReconcileReport, StoreError>
where
    S: ReferenceStore + ?Sized,
    M: ReferenceMatcher + ?Sized,
{
    info!(owner_id, candidates = candidates.len(), "[RECONCILE] Starting reconciliation");

    let mut existing = store.select(&ReferenceFilter::owner(owner_id)).await.map_err(|e| {
        error!(error = ?e, owner_id, "[RECONCILE][ERROR] Failed to load stored references");
        e
    })?;
    let mut report = ReconcileReport::default();

    for candidate in candidates {
        let matched = existing
            .iter()
            .position(|stored| matcher.is_same(stored, candidate));

        match matched {
            None => {
                let id = store.insert(owner_id, candidate).await.map_err(|e| {
                    error!(error = ?e, key = %candidate.key(), "[RECONCILE][ERROR] Insert failed");
                    e
                })?;
                info!(id = %id, key = %candidate.key(), from_agent = candidate.from_agent, "[RECONCILE] Inserted reference");
                let mut stored = candidate.clone();
                stored.id = Some(id);
                existing.push(stored);
                report.inserted += 1;
            }
            Some(idx) if candidate.in_document && !existing[idx].in_document => {
                let stored = &mut existing[idx];
                let Some(id) = stored.id.clone() else {
                    warn!(key = %stored.key(), "[RECONCILE] Stored reference has no id, cannot flag");
                    report.unchanged += 1;
                    continue;
                };
                let patch = ReferencePatch {
                    in_document: Some(true),
                    ..Default::default()
                };
                store.update(&id, &patch).await.map_err(|e| {
                    error!(error = ?e, id = %id, "[RECONCILE][ERROR] Flag update failed");
                    e
                })?;
                debug!(id = %id, "[RECONCILE] Marked reference as used in document");
                stored.in_document = true;
                report.flagged += 1;
            }
            Some(_) => {
                report.unchanged += 1;
            }
        }
    }

    info!(
        inserted = report.inserted,
        flagged = report.flagged,
        unchanged = report.unchanged,
        "[RECONCILE] Reconciliation complete"
    );
    Ok(report)
}

/// Whether `document` cites `(surname, year)`: the surname followed closely by
/// the year, as in `García (2021)`, `(García, 2021)` or `García, R. (2021)`.
pub fn is_cited_in(document: &str, reference: &Reference) -> bool {
    let surname = first_author_surname(&reference.author);
    if surname.is_empty() || reference.year.is_empty() {
        return false;
    }
    let pattern = format!(
        r"{}[^()]{{0,40}}?\(?{}",
        regex::escape(surname),
        regex::escape(&reference.year)
    );
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(document),
        Err(e) => {
            warn!(error = %e, surname, "[SYNC] Could not build citation pattern");
            false
        }
    }
}

/// Recompute every stored `in_document` flag from `document`.
///
/// Returns the number of records updated; a second run over the same text
/// updates nothing.
pub async fn sync_usage<S>(store: &S, owner_id: &str, document: &str) -> Result<usize, StoreError>
where
    S: ReferenceStore + ?Sized,
{
    info!(owner_id, document_len = document.len(), "[SYNC] Re-deriving in-document flags");
    let stored = store.select(&ReferenceFilter::owner(owner_id)).await?;
    let mut updated = 0;

    for reference in &stored {
        let cited = is_cited_in(document, reference);
        if cited == reference.in_document {
            continue;
        }
        let Some(id) = reference.id.as_deref() else {
            warn!(key = %reference.key(), "[SYNC] Stored reference has no id, skipping");
            continue;
        };
        let patch = ReferencePatch {
            in_document: Some(cited),
            ..Default::default()
        };
        store.update(id, &patch).await.map_err(|e| {
            error!(error = ?e, id, "[SYNC][ERROR] Flag update failed");
            e
        })?;
        debug!(id, in_document = cited, "[SYNC] Flag corrected");
        updated += 1;
    }

    info!(checked = stored.len(), updated, "[SYNC] Flags synchronised");
    Ok(updated)
}

/// Failure of [`add_reference`].
#[derive(Debug, thiserror::Error)]
pub enum AddReferenceError {
    #[error("reference rejected: {0}")]
    Rejected(#[from] ValidationError),
    #[error("store error: {0}")]
    Store(StoreError),
}

/// Result of a manual entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted(Reference),
    AlreadyPresent(Reference),
}

/// Parse a manually entered citation, validate it and store it unless an
/// equivalent reference already exists.
pub async fn add_reference<S, M>(
    store: &S,
    owner_id: &str,
    raw: &str,
    matcher: &M,
) -> Result<AddOutcome, AddReferenceError>
where
    S: ReferenceStore + ?Sized,
    M: ReferenceMatcher + ?Sized,
{
    let candidate = parse_citation(raw);
    if let Err(e) = validate_reference(&candidate) {
        warn!(input = raw, reason = %e, "[ADD] Citation rejected");
        return Err(e.into());
    }

    let stored = store
        .select(&ReferenceFilter::owner(owner_id))
        .await
        .map_err(AddReferenceError::Store)?;
    if let Some(existing) = stored.into_iter().find(|s| matcher.is_same(s, &candidate)) {
        info!(key = %candidate.key(), "[ADD] Reference already in bibliography");
        return Ok(AddOutcome::AlreadyPresent(existing));
    }

    let id = store
        .insert(owner_id, &candidate)
        .await
        .map_err(AddReferenceError::Store)?;
    info!(id = %id, key = %candidate.key(), "[ADD] Reference added");
    let mut inserted = candidate;
    inserted.id = Some(id);
    Ok(AddOutcome::Inserted(inserted))
}

/// Remove one reference.
pub async fn delete_reference<S>(store: &S, id: &str) -> Result<(), StoreError>
where
    S: ReferenceStore + ?Sized,
{
    store.delete(id).await?;
    info!(id, "[DELETE] Reference deleted");
    Ok(())
}

/// Remove every reference of the owner, or only those whose `in_document`
/// flag equals `in_document`. Returns the number deleted.
pub async fn delete_references<S>(
    store: &S,
    owner_id: &str,
    in_document: Option<bool>,
) -> Result<usize, StoreError>
where
    S: ReferenceStore + ?Sized,
{
    let filter = ReferenceFilter {
        owner_id: owner_id.to_string(),
        in_document,
    };
    let ids: Vec<String> = store
        .select(&filter)
        .await?
        .into_iter()
        .filter_map(|r| r.id)
        .collect();
    // Fail fast on the first deletion error.
    try_join_all(ids.iter().map(|id| store.delete(id))).await?;
    info!(owner_id, ?in_document, deleted = ids.len(), "[DELETE] Bulk delete complete");
    Ok(ids.len())
}
