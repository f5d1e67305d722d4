//! Context assembly for the downstream generation step.
//!
//! Produces one plain string from a document's chunks, either the chunks
//! most relevant to a topic (ranked order) or the leading chunks of the
//! document (insertion order). Chunks are separated by a blank line. No
//! truncation happens here; the caller enforces any length limit of the
//! generation service.

use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::error::RagError;
use crate::retrieval::query_document;
use crate::tenant::Collection;

/// Separator placed between chunk texts.
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// Downstream text generation (answers, summaries, quizzes).
///
/// Receives the assembled context and the caller's prompt and returns
/// generated text. Any length limit of the model is the implementor's
/// concern.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, context: &str, prompt: &str) -> Result<String, RagError>;
}

/// Build context for `file_id`.
///
/// With a non-blank `topic`, runs retrieval and joins the top `top_k`
/// chunks in rank order. Otherwise joins the first `top_k` chunks in
/// storage order. A file with no chunks yields an empty string.
pub async fn get_document_context(
    collection: &Collection,
    embedder: &dyn Embedder,
    file_id: &str,
    topic: Option<&str>,
    top_k: usize,
) -> Result<String, RagError> {
    match topic.filter(|t| !t.trim().is_empty()) {
        Some(topic) => {
            let response = query_document(collection, embedder, file_id, topic, top_k).await?;
            Ok(join_chunks(response.chunks.iter().map(|c| c.text.as_str())))
        }
        None => {
            if top_k == 0 {
                return Ok(String::new());
            }
            let chunks = collection.list(file_id, Some(top_k)).await?;
            Ok(join_chunks(chunks.iter().map(|c| c.text.as_str())))
        }
    }
}

/// Join chunk texts with [`CHUNK_SEPARATOR`].
pub fn join_chunks<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts.into_iter().collect::<Vec<_>>().join(CHUNK_SEPARATOR)
}
