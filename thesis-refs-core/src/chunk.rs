//! Document chunker and chunked document storage.
//!
//! A serialized document is cut into fixed-size pieces by character count,
//! never inside a UTF-8 sequence. Chunk `i` starts at character `i * size`.

use tracing::{debug, error, info};

use crate::contract::{ChunkStore, DocumentChunk, StoreError};

/// Characters per stored chunk.
pub const CHUNK_SIZE: usize = 4000;

/// Split `content` into ordered chunks of at most `size` characters.
///
/// The empty string gives no chunks. A `size` of zero is treated as one.
pub fn chunk(content: &str, size: usize) -> Vec<DocumentChunk> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in content.char_indices() {
        if count == size {
            chunks.push(DocumentChunk {
                chunk_index: chunks.len(),
                content: content[start..offset].to_string(),
            });
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < content.len() {
        chunks.push(DocumentChunk {
            chunk_index: chunks.len(),
            content: content[start..].to_string(),
        });
    }
    chunks
}

/// Reassemble chunks in `chunk_index` order, whatever order they arrive in.
pub fn join(chunks: &[DocumentChunk]) -> String {
    let mut ordered: Vec<&DocumentChunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.chunk_index);
    ordered.into_iter().map(|c| c.content.as_str()).collect()
}

/// Replace the owner's stored document with `content`.
pub async fn save_document<S>(
    store: &S,
    owner_id: &str,
    content: &str,
    chunk_size: usize,
) -> Result<usize, StoreError>
where
    S: ChunkStore + ?Sized,
{
    let chunks = chunk(content, chunk_size);
    debug!(owner_id, chunks = chunks.len(), chunk_size, "[CHUNKS] Replacing stored document");
    store.replace_all(owner_id, &chunks).await.map_err(|e| {
        error!(error = ?e, owner_id, "[CHUNKS][ERROR] Failed to store document chunks");
        e
    })?;
    info!(owner_id, chunks = chunks.len(), chars = content.chars().count(), "[CHUNKS] Document saved");
    Ok(chunks.len())
}

/// Load the owner's stored document. No chunks is the empty document.
pub async fn load_document<S>(store: &S, owner_id: &str) -> Result<String, StoreError>
where
    S: ChunkStore + ?Sized,
{
    let chunks = store.select_ordered(owner_id).await.map_err(|e| {
        error!(error = ?e, owner_id, "[CHUNKS][ERROR] Failed to load document chunks");
        e
    })?;
    info!(owner_id, chunks = chunks.len(), "[CHUNKS] Document loaded");
    Ok(join(&chunks))
}
