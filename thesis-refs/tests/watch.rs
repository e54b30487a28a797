use std::fs::write;
use std::sync::Arc;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;
use thesis_refs::load_config::load_config;
use thesis_refs::watch::autosave_document;
use thesis_refs_core::autosave::AutoSaveSession;
use thesis_refs_core::chunk::load_document;
use thesis_refs_core::memory::InMemoryStore;
use tokio::time::sleep;

fn document(content: &str) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".txt")
        .tempfile()
        .expect("Creating temp file failed");
    write(file.path(), content).expect("Writing temp file failed");
    file
}

fn config_with_autosave(quiet: u64, force: u64) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(
        file.path(),
        format!(
            "owner_id: u1\nstore:\n  url: http://127.0.0.1:9\nagents:\n  base_url: http://127.0.0.1:9\nautosave:\n  quiet_period_secs: {quiet}\n  force_save_secs: {force}\n"
        ),
    )
    .unwrap();
    file
}

#[tokio::test(start_paused = true)]
async fn file_change_is_saved_after_configured_quiet_period() {
    let config = load_config(config_with_autosave(2, 30).path()).expect("Config should load");
    let doc = document("Primera versión.");
    let path = doc.path().to_path_buf();
    let store = Arc::new(InMemoryStore::new());

    let edit_then_wait = {
        let path = path.clone();
        let store = store.clone();
        async move {
            sleep(Duration::from_secs(1)).await;
            write(&path, "Segunda versión, según García (2021).").unwrap();
            sleep(Duration::from_secs(2)).await;
            assert_eq!(load_document(&*store, "u1").await.unwrap(), "");
            sleep(Duration::from_secs(2)).await;
        }
    };

    let (changes, summary) = autosave_document(
        store.clone(),
        &config.owner_id,
        config.chunk_size,
        AutoSaveSession::from_config(&config.autosave),
        &path,
        Duration::from_millis(200),
        edit_then_wait,
    )
    .await
    .unwrap();

    assert_eq!(changes, 1);
    assert_eq!(summary.saves, 1);
    assert_eq!(summary.failures, 0);
    assert_eq!(
        load_document(&*store, "u1").await.unwrap(),
        "<p>Segunda versión, según García (2021).</p>"
    );
}

#[tokio::test(start_paused = true)]
async fn pending_change_is_flushed_when_watch_stops() {
    let doc = document("Borrador.");
    let path = doc.path().to_path_buf();
    let store = Arc::new(InMemoryStore::new());
    let session = AutoSaveSession::new(Duration::from_secs(60), Duration::from_secs(600));

    let edit_then_stop = {
        let path = path.clone();
        async move {
            sleep(Duration::from_secs(1)).await;
            write(&path, "Borrador corregido.").unwrap();
            sleep(Duration::from_secs(1)).await;
        }
    };

    let (changes, summary) = autosave_document(
        store.clone(),
        "u1",
        4000,
        session,
        &path,
        Duration::from_millis(100),
        edit_then_stop,
    )
    .await
    .unwrap();

    assert_eq!(changes, 1);
    assert_eq!(summary.saves, 1);
    assert_eq!(load_document(&*store, "u1").await.unwrap(), "<p>Borrador corregido.</p>");
}

#[tokio::test(start_paused = true)]
async fn unchanged_file_is_never_saved() {
    let doc = document("Sin cambios.");
    let store = Arc::new(InMemoryStore::new());

    let (changes, summary) = autosave_document(
        store.clone(),
        "u1",
        4000,
        AutoSaveSession::new(Duration::from_secs(1), Duration::from_secs(5)),
        doc.path(),
        Duration::from_millis(100),
        sleep(Duration::from_secs(10)),
    )
    .await
    .unwrap();

    assert_eq!(changes, 0);
    assert_eq!(summary.saves, 0);
    assert_eq!(load_document(&*store, "u1").await.unwrap(), "");
}

#[test]
fn watch_without_store_key_fails_cleanly() {
    let config = config_with_autosave(3, 30);
    let doc = document("Texto.");
    let mut cmd = Command::cargo_bin("thesis-refs").expect("Binary exists");
    cmd.arg("watch")
        .arg("--config")
        .arg(config.path())
        .arg("--file")
        .arg(doc.path())
        .arg("--seconds")
        .arg("1")
        .env_remove("SUPABASE_KEY");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("SUPABASE_KEY"));
}
