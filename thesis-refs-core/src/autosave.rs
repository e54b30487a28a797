//! Debounced auto-save.
//!
//! [`AutoSaveSession`] is the pure state: when the last edit happened and
//! since when changes have been pending. A save is due once no edit arrived
//! for the quiet period, or once changes have been pending for the force-save
//! interval even while edits keep coming.
//!
//! [`AutoSaver`] drives a session from a channel of document snapshots using
//! tokio timers and stores the latest snapshot with [`save_document`]. Saves
//! run inside the loop, so two saves of one saver never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use crate::chunk::save_document;
use crate::config::AutoSaveConfig;
use crate::contract::ChunkStore;

#[derive(Debug, Clone)]
pub struct AutoSaveSession {
    quiet_period: Duration,
    force_save: Duration,
    last_edit: Option<Instant>,
    pending_since: Option<Instant>,
}

impl AutoSaveSession {
    pub fn new(quiet_period: Duration, force_save: Duration) -> Self {
        Self {
            quiet_period,
            force_save,
            last_edit: None,
            pending_since: None,
        }
    }

    pub fn from_config(config: &AutoSaveConfig) -> Self {
        Self::new(config.quiet_period(), config.force_save())
    }

    pub fn mark_edited(&mut self, now: Instant) {
        self.last_edit = Some(now);
        self.pending_since.get_or_insert(now);
    }

    pub fn mark_saved(&mut self) {
        self.last_edit = None;
        self.pending_since = None;
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Earliest instant at which a save becomes due, if anything is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        let last_edit = self.last_edit?;
        let pending_since = self.pending_since?;
        Some((last_edit + self.quiet_period).min(pending_since + self.force_save))
    }

    pub fn should_save(&self, now: Instant) -> bool {
        self.next_deadline().is_some_and(|deadline| now >= deadline)
    }
}

/// Counters returned when an [`AutoSaver`] stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveSummary {
    pub saves: usize,
    pub failures: usize,
}

pub struct AutoSaver<S: ChunkStore + ?Sized> {
    store: Arc<S>,
    owner_id: String,
    chunk_size: usize,
    session: AutoSaveSession,
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl<S: ChunkStore + ?Sized> AutoSaver<S> {
    pub fn new(store: Arc<S>, owner_id: impl Into<String>, chunk_size: usize, session: AutoSaveSession) -> Self {
        Self {
            store,
            owner_id: owner_id.into(),
            chunk_size,
            session,
        }
    }

    /// Consume snapshots until the sender is dropped, then save whatever is
    /// still pending.
    pub async fn run(mut self, mut edits: mpsc::Receiver<String>) -> AutoSaveSummary {
        let mut summary = AutoSaveSummary::default();
        let mut latest = String::new();
        info!(owner_id = %self.owner_id, "[AUTOSAVE] Started");

        loop {
            let deadline = self.session.next_deadline();
            tokio::select! {
                edit = edits.recv() => match edit {
                    Some(content) => {
                        self.session.mark_edited(Instant::now());
                        latest = content;
                    }
                    None => break,
                },
                _ = wait_until(deadline) => {
                    if self.session.should_save(Instant::now()) {
                        self.save(&latest, &mut summary).await;
                    }
                }
            }
        }

        if self.session.has_unsaved_changes() {
            debug!("[AUTOSAVE] Channel closed with unsaved changes, final save");
            self.save(&latest, &mut summary).await;
        }
        info!(saves = summary.saves, failures = summary.failures, "[AUTOSAVE] Stopped");
        summary
    }

    async fn save(&mut self, content: &str, summary: &mut AutoSaveSummary) {
        match save_document(&*self.store, &self.owner_id, content, self.chunk_size).await {
            Ok(chunks) => {
                self.session.mark_saved();
                summary.saves += 1;
                debug!(chunks, "[AUTOSAVE] Saved");
            }
            Err(e) => {
                // Still unsaved; wait for another quiet period before the next attempt.
                self.session.mark_saved();
                self.session.mark_edited(Instant::now());
                summary.failures += 1;
                error!(error = ?e, "[AUTOSAVE][ERROR] Save failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::load_document;
    use crate::memory::InMemoryStore;
    use tokio::time::sleep;

    fn session() -> AutoSaveSession {
        AutoSaveSession::new(Duration::from_secs(3), Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn session_waits_for_quiet_period() {
        let t0 = Instant::now();
        let mut s = session();
        assert!(!s.has_unsaved_changes());
        assert!(!s.should_save(t0));

        s.mark_edited(t0);
        assert!(s.has_unsaved_changes());
        assert!(!s.should_save(t0 + Duration::from_secs(2)));
        s.mark_edited(t0 + Duration::from_secs(2));
        assert!(!s.should_save(t0 + Duration::from_secs(4)));
        assert!(s.should_save(t0 + Duration::from_secs(5)));

        s.mark_saved();
        assert!(!s.has_unsaved_changes());
        assert_eq!(s.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn session_forces_save_under_continuous_editing() {
        let t0 = Instant::now();
        let mut s = session();
        for i in 0..16 {
            s.mark_edited(t0 + Duration::from_secs(2 * i));
        }
        assert_eq!(s.next_deadline(), Some(t0 + Duration::from_secs(30)));
        assert!(s.should_save(t0 + Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn saver_debounces_burst_of_edits() {
        let store = Arc::new(InMemoryStore::new());
        let (tx, rx) = mpsc::channel(16);
        let saver = AutoSaver::new(store.clone(), "u1", 4, session());
        let handle = tokio::spawn(saver.run(rx));

        tx.send("<p>a</p>".to_string()).await.unwrap();
        tx.send("<p>ab</p>".to_string()).await.unwrap();
        sleep(Duration::from_secs(4)).await;
        assert_eq!(load_document(&*store, "u1").await.unwrap(), "<p>ab</p>");

        drop(tx);
        let summary = handle.await.unwrap();
        assert_eq!(summary, AutoSaveSummary { saves: 1, failures: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn saver_force_saves_and_flushes_on_close() {
        let store = Arc::new(InMemoryStore::new());
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(AutoSaver::new(store.clone(), "u1", 4000, session()).run(rx));

        for i in 0..16 {
            tx.send(format!("v{i}")).await.unwrap();
            sleep(Duration::from_secs(2)).await;
        }
        assert!(!load_document(&*store, "u1").await.unwrap().is_empty());

        tx.send("final".to_string()).await.unwrap();
        drop(tx);
        let summary = handle.await.unwrap();
        assert!(summary.saves >= 2);
        assert_eq!(load_document(&*store, "u1").await.unwrap(), "final");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_is_counted_and_retried_on_close() {
        let store = Arc::new(InMemoryStore::new());
        store.set_simulate_write_error(true);
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(AutoSaver::new(store.clone(), "u1", 4000, session()).run(rx));

        tx.send("texto".to_string()).await.unwrap();
        sleep(Duration::from_secs(4)).await;
        store.set_simulate_write_error(false);
        drop(tx);

        let summary = handle.await.unwrap();
        assert_eq!(summary, AutoSaveSummary { saves: 1, failures: 1 });
        assert_eq!(load_document(&*store, "u1").await.unwrap(), "texto");
    }
}
