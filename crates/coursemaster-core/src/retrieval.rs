//! Scoped similarity retrieval.
//!
//! Embeds the query with the indexing model and asks the owner's
//! collection for the nearest chunks of one file. Distances become
//! scores via `score = 1 − distance`; with the cosine distance used by
//! every bundled store that puts scores in `[-1, 1]`, so callers should
//! treat them as a ranking key rather than a probability.

use tracing::debug;

use crate::embedding::{embed_query, Embedder};
use crate::error::RagError;
use crate::models::{ChunkHit, QueryResponse, QueryResultEntry};
use crate::tenant::Collection;

/// Return the `top_k` chunks of `file_id` most similar to `query`.
///
/// A file with no chunks, a blank query, or `top_k == 0` yields an empty
/// response rather than an error, without calling the embedder. A query
/// vector of the wrong dimension is an embedding failure.
pub async fn query_document(
    collection: &Collection,
    embedder: &dyn Embedder,
    file_id: &str,
    query: &str,
    top_k: usize,
) -> Result<QueryResponse, RagError> {
    if top_k == 0 || query.trim().is_empty() {
        return Ok(QueryResponse::empty());
    }

    if collection.list(file_id, Some(1)).await?.is_empty() {
        return Ok(QueryResponse::empty());
    }

    let query_vec = embed_query(embedder, query).await?;
    if query_vec.len() != embedder.dims() {
        return Err(RagError::Embedding(format!(
            "query embedding has dimension {}, expected {}",
            query_vec.len(),
            embedder.dims()
        )));
    }
    let hits = collection.search(file_id, &query_vec, top_k).await?;
    let entries = rank(hits, top_k);

    debug!(
        owner = %collection.owner(),
        file_id,
        top_k,
        results = entries.len(),
        "query complete"
    );
    Ok(QueryResponse::from_entries(entries))
}

/// Convert hits to scored entries ordered by descending score.
///
/// The sort is stable, so hits with equal scores keep the order the
/// underlying index returned them in.
pub fn rank(hits: Vec<ChunkHit>, top_k: usize) -> Vec<QueryResultEntry> {
    let mut entries: Vec<QueryResultEntry> = hits
        .into_iter()
        .map(|hit| QueryResultEntry {
            text: hit.text,
            score: 1.0 - hit.distance,
            metadata: hit.metadata,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    entries.truncate(top_k);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn hit(idx: usize, distance: f64) -> ChunkHit {
        ChunkHit {
            text: format!("chunk {}", idx),
            metadata: ChunkMetadata {
                file_id: "f".to_string(),
                chunk_index: idx,
                owner: "o".to_string(),
            },
            distance,
        }
    }

    #[test]
    fn test_rank_converts_distance_to_score() {
        let ranked = rank(vec![hit(0, 0.25), hit(1, 1.5)], 5);
        assert!((ranked[0].score - 0.75).abs() < 1e-9);
        assert!((ranked[1].score + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_rank_orders_desc_with_stable_ties() {
        let ranked = rank(vec![hit(0, 0.5), hit(1, 0.1), hit(2, 0.5), hit(3, 0.9)], 10);
        let order: Vec<usize> = ranked.iter().map(|e| e.metadata.chunk_index).collect();
        assert_eq!(order, vec![1, 0, 2, 3]);
    }

    #[test]
    fn test_rank_truncates() {
        let ranked = rank(vec![hit(0, 0.1), hit(1, 0.2), hit(2, 0.3)], 2);
        assert_eq!(ranked.len(), 2);
    }
}
