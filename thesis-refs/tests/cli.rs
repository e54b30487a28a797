use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

fn temp_file_with(suffix: &str, content: &str) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Creating temp file failed");
    write(file.path(), content).expect("Writing temp file failed");
    file
}

#[test]
fn parse_prints_strict_apa_fields() {
    let mut cmd = Command::cargo_bin("thesis-refs").expect("Binary exists");
    cmd.arg("parse")
        .arg("Benites, F. (2024). Inteligencia Artificial en Tesis. Editorial UPAO");

    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains(r#""author": "Benites""#)
                .and(predicate::str::contains(r#""initials": "F.""#))
                .and(predicate::str::contains(r#""source": "Editorial UPAO""#)),
        );
}

#[test]
fn parse_never_fails_on_malformed_input() {
    let mut cmd = Command::cargo_bin("thesis-refs").expect("Binary exists");
    cmd.arg("parse").arg("Referencia mal formada sin año");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#""title": "Referencia mal formada sin año""#));
}

#[test]
fn scan_html_document_keeps_full_reference() {
    let doc = temp_file_with(
        ".html",
        "<p>Según García (2021), el método es válido.</p><p>García, R. (2021). Métodos cualitativos. Revista ABC.</p>",
    );
    let mut cmd = Command::cargo_bin("thesis-refs").expect("Binary exists");
    cmd.arg("scan").arg("--file").arg(doc.path());

    cmd.assert().success().stdout(
        predicate::str::contains(r#""title": "Métodos cualitativos""#)
            .and(predicate::str::contains(r#""in_document": true"#))
            .and(predicate::str::contains("Citation extracted from text").not()),
    );
}

#[test]
fn scan_agent_reads_markdown_table() {
    let md = temp_file_with(
        ".md",
        "| # | Autor (Año) | Título | Fuente | DOI |\n|---|---|---|---|---|\n| 1 | Creswell, J. (2014) | Research Design | SAGE | - |\n",
    );
    let mut cmd = Command::cargo_bin("thesis-refs").expect("Binary exists");
    cmd.arg("scan-agent").arg("--file").arg(md.path());
    cmd.assert().success().stdout(
        predicate::str::contains(r#""author": "Creswell, J.""#)
            .and(predicate::str::contains(r#""from_agent": true"#)),
    );
}

#[test]
fn scan_rejects_unsupported_document_type() {
    let doc = temp_file_with(".pdf", "%PDF-1.4");
    let mut cmd = Command::cargo_bin("thesis-refs").expect("Binary exists");
    cmd.arg("scan").arg("--file").arg(doc.path());
    cmd.assert().failure();
}

#[test]
fn sync_without_store_key_fails_cleanly() {
    let config = temp_file_with(
        ".yaml",
        "owner_id: u1\nstore:\n  url: http://127.0.0.1:9\nagents:\n  base_url: http://127.0.0.1:9\n",
    );
    let mut cmd = Command::cargo_bin("thesis-refs").expect("Binary exists");
    cmd.arg("sync")
        .arg("--config")
        .arg(config.path())
        .env_remove("SUPABASE_KEY");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("SUPABASE_KEY"));
}

#[test]
fn delete_requires_a_target() {
    let mut cmd = Command::cargo_bin("thesis-refs").expect("Binary exists");
    cmd.arg("delete").arg("--config").arg("config.yaml");
    cmd.assert().failure();
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use thesis_refs::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Sync {
            config: std::path::PathBuf::from("dummy.yaml"),
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}

#[test]
fn export_writes_atomically_into_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = thesis_refs::cli::write_export(dir.path(), "Bibliography_tesis.txt", "1. A (2020). B.\n")
        .unwrap();
    assert_eq!(path, dir.path().join("Bibliography_tesis.txt"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "1. A (2020). B.\n");
}
