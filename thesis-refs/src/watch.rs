//! Auto-save for a document edited outside this tool.
//!
//! The file is polled; every change in its stored form is an edit fed to an
//! [`AutoSaver`], which decides when to write it to the chunk store.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use thesis_refs_core::autosave::{AutoSaveSession, AutoSaveSummary, AutoSaver};
use thesis_refs_core::contract::ChunkStore;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::document::read_document;

/// Poll `path` every `poll` until `stop` resolves, sending each changed
/// snapshot to `edits`. The content found on the first read is the baseline
/// and is not sent. Returns the number of snapshots sent.
pub async fn watch_document<F>(
    path: &Path,
    poll: Duration,
    edits: mpsc::Sender<String>,
    stop: F,
) -> Result<usize>
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(poll);
    let mut last: Option<String> = None;
    let mut sent = 0;
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let document = match read_document(path) {
                    Ok(document) => document,
                    Err(e) => {
                        warn!(error = %e, "[WATCH] Document unreadable, retrying on next poll");
                        continue;
                    }
                };
                if last.as_deref() == Some(document.content.as_str()) {
                    continue;
                }
                if last.is_some() {
                    debug!(chars = document.content.chars().count(), "[WATCH] Document changed");
                    edits
                        .send(document.content.clone())
                        .await
                        .context("Auto-saver stopped before the watch ended")?;
                    sent += 1;
                }
                last = Some(document.content);
            }
        }
    }

    info!(path = %path.display(), changes = sent, "[WATCH] Stopped");
    Ok(sent)
}

/// Watch `path` and auto-save its changes for `owner_id` until `stop`
/// resolves. Pending changes are saved before this returns.
pub async fn autosave_document<S, F>(
    store: Arc<S>,
    owner_id: &str,
    chunk_size: usize,
    session: AutoSaveSession,
    path: &Path,
    poll: Duration,
    stop: F,
) -> Result<(usize, AutoSaveSummary)>
where
    S: ChunkStore + 'static,
    F: Future<Output = ()>,
{
    let (tx, rx) = mpsc::channel(16);
    let saver = tokio::spawn(AutoSaver::new(store, owner_id, chunk_size, session).run(rx));
    let changes = watch_document(path, poll, tx, stop).await;
    let summary = saver.await.context("Auto-saver task failed")?;
    Ok((changes?, summary))
}
