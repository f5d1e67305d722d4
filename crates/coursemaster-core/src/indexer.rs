//! Document indexing pipeline: chunk → embed → single atomic write.
//!
//! All embeddings for a document are computed before anything touches the
//! store, and the chunks are then written with one
//! [`Collection::replace_file`] call. Any failure along the way leaves the
//! owner's collection exactly as it was.

use tracing::{debug, info};

use crate::chunk::{chunk_words, ChunkingParams};
use crate::embedding::Embedder;
use crate::error::RagError;
use crate::models::{chunk_key, Chunk, ChunkMetadata, ChunkRecord, IndexReport, OwnerId};
use crate::tenant::Collection;

/// Chunk, embed, and store `text` as `file_id` in `collection`.
///
/// Reindexing an existing `file_id` replaces its chunks.
pub async fn index_document(
    collection: &Collection,
    embedder: &dyn Embedder,
    params: &ChunkingParams,
    batch_size: usize,
    file_id: &str,
    text: &str,
) -> Result<IndexReport, RagError> {
    let chunks = chunk_words(text, params)?;
    debug!(
        owner = %collection.owner(),
        file_id,
        chunks = chunks.len(),
        "chunked document"
    );

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_in_batches(embedder, &texts, batch_size).await?;
    let records = build_records(collection.owner(), file_id, chunks, vectors);

    collection.replace_file(file_id, &records).await?;

    let report = IndexReport {
        total_chunks: records.len(),
        total_chars: text.chars().count(),
    };
    info!(
        owner = %collection.owner(),
        file_id,
        total_chunks = report.total_chunks,
        total_chars = report.total_chars,
        "indexed document"
    );
    Ok(report)
}

/// Embed `texts` in batches of `batch_size`, checking that the model
/// returned one vector per text with the advertised dimension.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, RagError> {
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embedder.embed(batch).await?;
        if embedded.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "model returned {} vectors for {} texts",
                embedded.len(),
                batch.len()
            )));
        }
        if let Some(bad) = embedded.iter().find(|v| v.len() != embedder.dims()) {
            return Err(RagError::Embedding(format!(
                "model returned a vector of dimension {}, expected {}",
                bad.len(),
                embedder.dims()
            )));
        }
        vectors.extend(embedded);
    }

    Ok(vectors)
}

fn build_records(
    owner: &OwnerId,
    file_id: &str,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
) -> Vec<ChunkRecord> {
    chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, embedding)| ChunkRecord {
            key: chunk_key(file_id, chunk.chunk_index),
            text: chunk.text,
            start_index: chunk.start_index,
            end_index: chunk.end_index,
            metadata: ChunkMetadata {
                file_id: file_id.to_string(),
                chunk_index: chunk.chunk_index,
                owner: owner.to_string(),
            },
            embedding,
        })
        .collect()
}
