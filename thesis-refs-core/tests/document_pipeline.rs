use mockall::Sequence;
use thesis_refs_core::analysis::{analyze_document, AnalysisError};
use thesis_refs_core::chunk::{load_document, save_document, CHUNK_SIZE};
use thesis_refs_core::config::AgentsConfig;
use thesis_refs_core::contract::{AgentError, DocumentChunk, MockAgent, MockChunkStore, Reference};
use thesis_refs_core::memory::InMemoryStore;

fn agents() -> AgentsConfig {
    AgentsConfig {
        base_url: "http://localhost:7860".to_string(),
        structure_flow: "flow-structure".to_string(),
        style_flow: "flow-style".to_string(),
        citations_flow: "flow-citations".to_string(),
        token: None,
    }
}

const THESIS: &str = "Introducción. Esta tesis estudia el uso de inteligencia artificial en la redacción académica, según García (2021).";

#[tokio::test]
async fn document_survives_save_and_load() {
    let store = InMemoryStore::new();
    let content = format!("<h1>Tesis</h1>{}", "<p>Párrafo con acentos: ñ, é.</p>".repeat(400));

    let chunks = save_document(&store, "u1", &content, CHUNK_SIZE).await.unwrap();
    assert_eq!(chunks, content.chars().count().div_ceil(CHUNK_SIZE));
    assert_eq!(load_document(&store, "u1").await.unwrap(), content);

    save_document(&store, "u1", "", CHUNK_SIZE).await.unwrap();
    assert_eq!(load_document(&store, "u1").await.unwrap(), "");
}

#[tokio::test]
async fn save_replaces_all_chunks_in_order() {
    let mut store = MockChunkStore::new();
    store
        .expect_replace_all()
        .times(1)
        .withf(|owner, chunks| {
            owner == "u1"
                && chunks.len() == 3
                && chunks.iter().enumerate().all(|(i, c)| c.chunk_index == i)
        })
        .returning(|_, _| Ok(()));

    assert_eq!(save_document(&store, "u1", "abcdefgh", 3).await.unwrap(), 3);
}

#[tokio::test]
async fn load_propagates_store_failure() {
    let mut store = MockChunkStore::new();
    store
        .expect_select_ordered()
        .returning(|_| Err("connection refused".into()));
    assert!(load_document(&store, "u1").await.is_err());
}

#[tokio::test]
async fn load_joins_chunks_by_index() {
    let mut store = MockChunkStore::new();
    store.expect_select_ordered().returning(|_| {
        Ok(vec![
            DocumentChunk {
                chunk_index: 1,
                content: "mundo".to_string(),
            },
            DocumentChunk {
                chunk_index: 0,
                content: "hola ".to_string(),
            },
        ])
    });
    assert_eq!(load_document(&store, "u1").await.unwrap(), "hola mundo");
}

#[tokio::test]
async fn analysis_calls_three_agents_in_order() {
    let mut agent = MockAgent::new();
    let mut seq = Sequence::new();
    agent
        .expect_invoke()
        .withf(|flow, _, _| flow == "flow-structure")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok("Falta la justificación.".to_string()));
    agent
        .expect_invoke()
        .withf(|flow, _, _| flow == "flow-style")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok("Evita la voz pasiva.".to_string()));
    agent
        .expect_invoke()
        .withf(|flow, prompt, context| {
            flow == "flow-citations" && prompt.contains("(García, 2021)") && context == "(García, 2021)"
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| {
            Ok("| # | Autor (Año) | Título | Fuente | DOI |\n|---|---|---|---|---|\n| 1 | Creswell, J. (2014) | Research Design | SAGE | - |\n".to_string())
        });

    let stored = [Reference::new("García, R.", "2021", "Métodos")];
    let report = analyze_document(&agent, &agents(), THESIS, &stored).await.unwrap();

    assert_eq!(report.structure, "Falta la justificación.");
    assert_eq!(report.style, "Evita la voz pasiva.");
    assert_eq!(report.suggestions.len(), 1);
    assert_eq!(report.suggestions[0].author, "Creswell, J.");
    assert!(report.suggestions[0].from_agent);
}

#[tokio::test]
async fn short_text_is_rejected_before_any_agent_call() {
    let mut agent = MockAgent::new();
    agent.expect_invoke().never();
    let err = analyze_document(&agent, &agents(), "   Muy corto.   ", &[]).await.unwrap_err();
    assert!(matches!(err, AnalysisError::TooShort { chars: 10 }));
}

#[tokio::test]
async fn rate_limit_stops_the_pipeline() {
    let mut agent = MockAgent::new();
    agent
        .expect_invoke()
        .withf(|flow, _, _| flow == "flow-structure")
        .times(1)
        .returning(|_, _, _| Err(AgentError::RateLimited));
    agent
        .expect_invoke()
        .withf(|flow, _, _| flow != "flow-structure")
        .never();

    let err = analyze_document(&agent, &agents(), THESIS, &[]).await.unwrap_err();
    match err {
        AnalysisError::Agent { stage, source } => {
            assert_eq!(stage, "structure");
            assert!(matches!(source, AgentError::RateLimited));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
