//! In-memory collaborator for tests and offline runs.
//!
//! Implements both [`ReferenceStore`] and [`ChunkStore`]. Ids are uuid v4
//! strings assigned on insert; records keep insertion order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::contract::{
    ChunkStore, DocumentChunk, Reference, ReferenceFilter, ReferencePatch, ReferenceStore,
    StoreError,
};

#[derive(Debug, Clone)]
struct Row {
    owner_id: String,
    reference: Reference,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    references: RwLock<Vec<Row>>,
    chunks: RwLock<HashMap<String, Vec<DocumentChunk>>>,
    simulate_write_error: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, for error-path tests.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Snapshot of every stored reference across all owners.
    pub async fn all_references(&self) -> Vec<Reference> {
        self.references
            .read()
            .await
            .iter()
            .map(|row| row.reference.clone())
            .collect()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err("simulated write error".into());
        }
        Ok(())
    }
}

#[async_trait]
impl ReferenceStore for InMemoryStore {
    async fn select(&self, filter: &ReferenceFilter) -> Result<Vec<Reference>, StoreError> {
        let rows = self.references.read().await;
        Ok(rows
            .iter()
            .filter(|row| row.owner_id == filter.owner_id)
            .filter(|row| {
                filter
                    .in_document
                    .map_or(true, |flag| row.reference.in_document == flag)
            })
            .map(|row| row.reference.clone())
            .collect())
    }

    async fn insert(&self, owner_id: &str, reference: &Reference) -> Result<String, StoreError> {
        self.check_writable()?;
        let id = uuid::Uuid::new_v4().to_string();
        let mut reference = reference.clone();
        reference.id = Some(id.clone());
        self.references.write().await.push(Row {
            owner_id: owner_id.to_string(),
            reference,
        });
        Ok(id)
    }

    async fn update(&self, id: &str, patch: &ReferencePatch) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut rows = self.references.write().await;
        let row = rows
            .iter_mut()
            .find(|row| row.reference.id.as_deref() == Some(id))
            .ok_or_else(|| format!("reference {id} not found"))?;
        if let Some(in_document) = patch.in_document {
            row.reference.in_document = in_document;
        }
        if let Some(from_agent) = patch.from_agent {
            row.reference.from_agent = from_agent;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.references
            .write()
            .await
            .retain(|row| row.reference.id.as_deref() != Some(id));
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn select_ordered(&self, owner_id: &str) -> Result<Vec<DocumentChunk>, StoreError> {
        let mut chunks = self
            .chunks
            .read()
            .await
            .get(owner_id)
            .cloned()
            .unwrap_or_default();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn replace_all(&self, owner_id: &str, chunks: &[DocumentChunk]) -> Result<(), StoreError> {
        self.check_writable()?;
        self.chunks
            .write()
            .await
            .insert(owner_id.to_string(), chunks.to_vec());
        Ok(())
    }
}
