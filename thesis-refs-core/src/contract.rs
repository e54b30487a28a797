//! # contract: data model and collaborator interfaces
//!
//! This module defines the canonical [`Reference`] record and [`DocumentChunk`],
//! plus the traits the core calls into for everything it does not implement
//! itself:
//!
//! - [`ReferenceStore`]: persisted bibliography (select / insert / update / delete)
//! - [`ChunkStore`]: chunked document storage (ordered select / full replace)
//! - [`Agent`]: a remote LLM agent invoked with a prompt and optional context
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; with the default
//!   `test-export-mocks` feature the generated `Mock*` types are public so
//!   integration tests in other crates can use them.
//!
//! ## Adapters
//! - Field naming is canonical here. Backends with other column names
//!   translate in their adapter, never in the core logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Error type for the persistence collaborators (simple boxed error).
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// A bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Identifier. Set by the citation parser for manual entries and by the
    /// store on insert; scanners leave it empty.
    pub id: Option<String>,
    /// Free-text author list; the first-listed surname is the identity key.
    pub author: String,
    /// Initials captured by the strict APA pattern (e.g. `F.`).
    pub initials: Option<String>,
    pub year: String,
    pub title: String,
    /// Journal or publisher.
    pub source: Option<String>,
    pub doi_link: Option<String>,
    /// Cited somewhere in the active document's text.
    pub in_document: bool,
    /// Suggested by an LLM agent rather than found in the user's document.
    pub from_agent: bool,
    pub created_at: DateTime<Utc>,
}

impl Reference {
    /// Bare record with empty optional fields and both flags unset.
    pub fn new(author: impl Into<String>, year: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            author: author.into(),
            initials: None,
            year: year.into(),
            title: title.into(),
            source: None,
            doi_link: None,
            in_document: false,
            from_agent: false,
            created_at: Utc::now(),
        }
    }

    /// Identity key: `(first author surname, year)`.
    pub fn key(&self) -> crate::citation::ReferenceKey {
        crate::citation::ReferenceKey::new(&self.author, &self.year)
    }
}

/// Selects references belonging to one owner, optionally by usage flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFilter {
    pub owner_id: String,
    pub in_document: Option<bool>,
}

impl ReferenceFilter {
    pub fn owner(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            in_document: None,
        }
    }

    pub fn in_document(mut self, in_document: bool) -> Self {
        self.in_document = Some(in_document);
        self
    }
}

/// Partial update. Only the boolean flags are ever patched automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferencePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_document: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_agent: Option<bool>,
}

/// A fixed-size slice of serialized document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_index: usize,
    pub content: String,
}

/// Persistence for the reference set.
///
/// The trait is implemented by real clients and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// List references matching the filter.
    async fn select(&self, filter: &ReferenceFilter) -> Result<Vec<Reference>, StoreError>;

    /// Persist a new reference for `owner_id`, returning its id.
    async fn insert(&self, owner_id: &str, reference: &Reference) -> Result<String, StoreError>;

    /// Apply a partial update to one reference.
    async fn update(&self, id: &str, patch: &ReferencePatch) -> Result<(), StoreError>;

    /// Delete one reference.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Persistence for chunked document content.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// All chunks for `owner_id`, ascending by `chunk_index`.
    async fn select_ordered(&self, owner_id: &str) -> Result<Vec<DocumentChunk>, StoreError>;

    /// Delete every chunk for `owner_id`, then insert `chunks`.
    async fn replace_all(&self, owner_id: &str, chunks: &[DocumentChunk]) -> Result<(), StoreError>;
}

/// Failure of a remote agent call.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent rate limit reached (HTTP 429); wait before sending another request")]
    RateLimited,
    #[error("agent server error (HTTP {status}): {body}")]
    ServerFault { status: u16, body: String },
    #[error("agent request failed (HTTP {status}): {body}")]
    Status { status: u16, body: String },
    #[error("agent transport error: {0}")]
    Transport(String),
    #[error("agent returned no message text")]
    EmptyResponse,
}

/// A remote LLM agent.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Agent: Send + Sync {
    /// Run `prompt` (with optional `context`) through the agent identified by
    /// `agent_id` and return its reply text.
    async fn invoke(&self, agent_id: &str, prompt: &str, context: &str)
        -> Result<String, AgentError>;
}
