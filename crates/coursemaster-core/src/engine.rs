//! The retrieval engine service object.
//!
//! [`RagEngine`] owns the embedding model handle and the tenant
//! collection registry. Construct it once at startup and share it behind
//! an `Arc`; every method is `&self` and scoped to an explicit owner.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`index_document`](RagEngine::index_document) | Chunk, embed, and atomically store a document |
//! | [`query_document`](RagEngine::query_document) | Top-k similarity search within one document |
//! | [`get_document_context`](RagEngine::get_document_context) | Topic-ranked or positional context string |
//! | [`context_for`](RagEngine::context_for) | Context with the top-k default of a use case |
//! | [`generate_with`](RagEngine::generate_with) | Context handed to a [`GenerationService`] |
//! | [`delete_document`](RagEngine::delete_document) | Remove one document's chunks |
//! | [`document_stats`](RagEngine::document_stats) | Chunk and character totals |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::chunk::ChunkingParams;
use crate::context::{self, GenerationService};
use crate::embedding::Embedder;
use crate::error::RagError;
use crate::indexer;
use crate::models::{DocumentStats, IndexReport, OwnerId, QueryResponse};
use crate::retrieval;
use crate::store::Store;
use crate::tenant::TenantCollections;

/// Default `top_k` per caller use case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopKDefaults {
    pub query: usize,
    pub chat: usize,
    pub summary: usize,
    pub quiz: usize,
}

impl Default for TopKDefaults {
    fn default() -> Self {
        Self {
            query: 5,
            chat: 10,
            summary: 15,
            quiz: 30,
        }
    }
}

/// What the assembled context will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseCase {
    Chat,
    Summary,
    Quiz,
}

impl UseCase {
    pub fn top_k(self, defaults: &TopKDefaults) -> usize {
        match self {
            Self::Chat => defaults.chat,
            Self::Summary => defaults.summary,
            Self::Quiz => defaults.quiz,
        }
    }
}

impl FromStr for UseCase {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "summary" => Ok(Self::Summary),
            "quiz" => Ok(Self::Quiz),
            other => Err(RagError::Configuration(format!(
                "unknown use case '{}'. Use chat, summary, or quiz.",
                other
            ))),
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Chat => "chat",
            Self::Summary => "summary",
            Self::Quiz => "quiz",
        })
    }
}

/// Engine tuning, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub chunking: ChunkingParams,
    /// Number of chunk texts sent to the embedder per call.
    pub batch_size: usize,
    pub top_k: TopKDefaults,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkingParams::default(),
            batch_size: 64,
            top_k: TopKDefaults::default(),
        }
    }
}

/// Shared retrieval and indexing engine.
pub struct RagEngine {
    embedder: Arc<dyn Embedder>,
    collections: TenantCollections,
    settings: EngineSettings,
}

impl RagEngine {
    /// Build an engine. Fails if the chunking parameters are invalid.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn Store>,
        settings: EngineSettings,
    ) -> Result<Self, RagError> {
        settings.chunking.validate()?;
        if settings.batch_size == 0 {
            return Err(RagError::Configuration(
                "embedding batch_size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            embedder,
            collections: TenantCollections::new(store),
            settings,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Index `text` as `file_id` for `owner`. All-or-nothing.
    pub async fn index_document(
        &self,
        owner: &OwnerId,
        file_id: &str,
        text: &str,
    ) -> Result<IndexReport, RagError> {
        let collection = self
            .collections
            .collection(owner)
            .await
            .map_err(|e| RagError::StoreWrite(e.to_string()))?;
        let result = indexer::index_document(
            &collection,
            self.embedder.as_ref(),
            &self.settings.chunking,
            self.settings.batch_size,
            file_id,
            text,
        )
        .await;
        if let Err(e) = &result {
            warn!(owner = %owner, file_id, error = %e, "indexing failed");
        }
        result
    }

    /// Top-`top_k` chunks of `file_id` for `query`.
    pub async fn query_document(
        &self,
        owner: &OwnerId,
        file_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<QueryResponse, RagError> {
        let collection = self.collections.collection(owner).await?;
        retrieval::query_document(&collection, self.embedder.as_ref(), file_id, query, top_k).await
    }

    /// Joined chunk text for the generation step; see [`context::get_document_context`].
    pub async fn get_document_context(
        &self,
        owner: &OwnerId,
        file_id: &str,
        topic: Option<&str>,
        top_k: usize,
    ) -> Result<String, RagError> {
        let collection = self.collections.collection(owner).await?;
        context::get_document_context(&collection, self.embedder.as_ref(), file_id, topic, top_k)
            .await
    }

    /// [`get_document_context`](Self::get_document_context) with the
    /// configured `top_k` of `use_case`.
    pub async fn context_for(
        &self,
        owner: &OwnerId,
        file_id: &str,
        topic: Option<&str>,
        use_case: UseCase,
    ) -> Result<String, RagError> {
        let top_k = use_case.top_k(&self.settings.top_k);
        self.get_document_context(owner, file_id, topic, top_k).await
    }

    /// Assemble context for `prompt` and pass both to `generator`.
    ///
    /// The prompt doubles as the retrieval topic. An unindexed document
    /// yields an empty context; whether to call the generator anyway is
    /// left to it.
    pub async fn generate_with(
        &self,
        owner: &OwnerId,
        file_id: &str,
        prompt: &str,
        use_case: UseCase,
        generator: &dyn GenerationService,
    ) -> Result<String, RagError> {
        let context = self
            .context_for(owner, file_id, Some(prompt), use_case)
            .await?;
        info!(
            owner = %owner,
            file_id,
            use_case = %use_case,
            context_chars = context.chars().count(),
            "handing context to generation"
        );
        generator.generate(&context, prompt).await
    }

    /// Remove every chunk of `file_id` owned by `owner`.
    ///
    /// Returns `Ok(true)` when chunks were removed and
    /// [`RagError::DocumentNotIndexed`] when there were none.
    pub async fn delete_document(&self, owner: &OwnerId, file_id: &str) -> Result<bool, RagError> {
        let collection = self
            .collections
            .collection(owner)
            .await
            .map_err(|e| RagError::StoreWrite(e.to_string()))?;
        let removed = collection.delete_file(file_id).await?;
        if removed == 0 {
            return Err(not_indexed(owner, file_id));
        }
        info!(owner = %owner, file_id, removed, "deleted document chunks");
        Ok(true)
    }

    /// Chunk count and stored chunk characters of an indexed document.
    pub async fn document_stats(
        &self,
        owner: &OwnerId,
        file_id: &str,
    ) -> Result<DocumentStats, RagError> {
        let collection = self.collections.collection(owner).await?;
        let chunks = collection.list(file_id, None).await?;
        if chunks.is_empty() {
            return Err(not_indexed(owner, file_id));
        }
        Ok(DocumentStats {
            owner: owner.to_string(),
            file_id: file_id.to_string(),
            total_chunks: chunks.len(),
            stored_chars: chunks.iter().map(|c| c.text.chars().count()).sum(),
        })
    }
}

fn not_indexed(owner: &OwnerId, file_id: &str) -> RagError {
    RagError::DocumentNotIndexed {
        owner: owner.to_string(),
        file_id: file_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::error::EmbeddingError;
    use crate::store::memory::InMemoryStore;

    const ALGORITHMS: &str = "Recursion solves a problem by reducing it to smaller instances \
        of the same problem until a base case is reached. Every recursive function needs a \
        base case and a recursive step that moves toward it.";
    const BIOLOGY: &str = "Photosynthesis happens in chloroplasts where chlorophyll absorbs \
        sunlight. Plants convert carbon dioxide and water into glucose and release oxygen \
        as a byproduct of the light reactions.";
    const HISTORY: &str = "The printing press spread literacy across Europe during the \
        fifteenth century. Movable type made books cheaper and accelerated the circulation \
        of new ideas among scholars and merchants.";

    fn engine_with(chunk_size: usize, overlap: usize) -> RagEngine {
        let settings = EngineSettings {
            chunking: ChunkingParams {
                chunk_size,
                overlap,
                min_chars: 50,
            },
            ..EngineSettings::default()
        };
        RagEngine::new(
            Arc::new(HashingEmbedder::new(512)),
            Arc::new(InMemoryStore::new()),
            settings,
        )
        .unwrap()
    }

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    fn engine_over(embedder: Arc<dyn Embedder>, store: Arc<InMemoryStore>) -> RagEngine {
        let settings = EngineSettings {
            chunking: ChunkingParams {
                chunk_size: 30,
                overlap: 0,
                min_chars: 50,
            },
            ..EngineSettings::default()
        };
        RagEngine::new(embedder, store, settings).unwrap()
    }

    /// Model endpoint that is down.
    struct UnavailableEmbedder;

    #[async_trait::async_trait]
    impl Embedder for UnavailableEmbedder {
        fn model_name(&self) -> &str {
            "unavailable"
        }

        fn dims(&self) -> usize {
            512
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::new("model unavailable"))
        }
    }

    /// Advertises more dimensions than it returns.
    struct TruncatingEmbedder;

    #[async_trait::async_trait]
    impl Embedder for TruncatingEmbedder {
        fn model_name(&self) -> &str {
            "truncating"
        }

        fn dims(&self) -> usize {
            512
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0; 256]).collect())
        }
    }

    fn course_text() -> String {
        format!("{} {} {}", ALGORITHMS, BIOLOGY, HISTORY)
    }

    #[test]
    fn test_new_rejects_bad_overlap() {
        let settings = EngineSettings {
            chunking: ChunkingParams {
                chunk_size: 10,
                overlap: 10,
                min_chars: 0,
            },
            ..EngineSettings::default()
        };
        let err = RagEngine::new(
            Arc::new(HashingEmbedder::new(8)),
            Arc::new(InMemoryStore::new()),
            settings,
        )
        .err()
        .unwrap();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_query_never_indexed_file_is_empty() {
        let engine = engine_with(512, 50);
        let resp = engine
            .query_document(&owner("u1"), "never-indexed-file", "anything", 5)
            .await
            .unwrap();
        assert_eq!(resp, QueryResponse::empty());
        assert_eq!(resp.total_results, 0);
    }

    #[tokio::test]
    async fn test_never_indexed_file_is_empty_without_embedding() {
        let engine = engine_over(Arc::new(UnavailableEmbedder), Arc::new(InMemoryStore::new()));
        let alice = owner("alice");

        let resp = engine
            .query_document(&alice, "never-indexed-file", "anything", 5)
            .await
            .unwrap();
        assert_eq!(resp, QueryResponse::empty());

        let ctx = engine
            .get_document_context(&alice, "never-indexed-file", Some("anything"), 5)
            .await
            .unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_on_indexed_document_is_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let alice = owner("alice");
        engine_over(Arc::new(HashingEmbedder::new(512)), Arc::clone(&store))
            .index_document(&alice, "course", &course_text())
            .await
            .unwrap();

        let down = engine_over(Arc::new(UnavailableEmbedder), store);
        let err = down
            .query_document(&alice, "course", "recursion", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Embedding(ref msg) if msg.contains("model unavailable")));

        let err = down
            .get_document_context(&alice, "course", Some("recursion"), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));

        // Positional context never embeds.
        let ctx = down
            .get_document_context(&alice, "course", None, 1)
            .await
            .unwrap();
        assert!(ctx.starts_with("Recursion solves"));
    }

    #[tokio::test]
    async fn test_query_vector_shorter_than_model_dims_is_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let alice = owner("alice");
        engine_over(Arc::new(HashingEmbedder::new(512)), Arc::clone(&store))
            .index_document(&alice, "course", &course_text())
            .await
            .unwrap();

        let err = engine_over(Arc::new(TruncatingEmbedder), store)
            .query_document(&alice, "course", "recursion", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Embedding(ref msg) if msg.contains("256")));
    }

    #[tokio::test]
    async fn test_changing_model_dims_after_indexing_fails_queries() {
        let store = Arc::new(InMemoryStore::new());
        let alice = owner("alice");
        engine_over(Arc::new(HashingEmbedder::new(64)), Arc::clone(&store))
            .index_document(&alice, "course", &course_text())
            .await
            .unwrap();

        let wider = engine_over(Arc::new(HashingEmbedder::new(128)), store);
        let err = wider
            .query_document(&alice, "course", "chlorophyll", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::StoreQuery(_)));

        let err = wider
            .get_document_context(&alice, "course", Some("chlorophyll"), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::StoreQuery(_)));
    }

    #[tokio::test]
    async fn test_verbatim_phrase_is_top_result() {
        let engine = engine_with(30, 0);
        let alice = owner("alice");
        engine
            .index_document(&alice, "course", &course_text())
            .await
            .unwrap();

        let resp = engine
            .query_document(&alice, "course", "chlorophyll absorbs sunlight", 5)
            .await
            .unwrap();
        assert!(resp.total_results > 1);
        assert!(resp.chunks[0].text.contains("chlorophyll absorbs sunlight"));
        for pair in resp.chunks.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_top_k_larger_than_chunk_count_returns_all() {
        let engine = engine_with(30, 0);
        let alice = owner("alice");
        let report = engine
            .index_document(&alice, "course", &course_text())
            .await
            .unwrap();
        let resp = engine
            .query_document(&alice, "course", "books", 100)
            .await
            .unwrap();
        assert_eq!(resp.total_results, report.total_chunks);
    }

    #[tokio::test]
    async fn test_owner_isolation_with_colliding_content() {
        let engine = engine_with(30, 0);
        let (alice, bob) = (owner("alice"), owner("bob"));
        engine.index_document(&alice, "shared", &course_text()).await.unwrap();
        engine.index_document(&bob, "shared", &course_text()).await.unwrap();

        let resp = engine
            .query_document(&alice, "shared", "printing press", 50)
            .await
            .unwrap();
        assert!(resp.total_results > 0);
        assert!(resp.chunks.iter().all(|c| c.metadata.owner == "alice"));

        engine.delete_document(&bob, "shared").await.unwrap();
        let still = engine
            .query_document(&alice, "shared", "printing press", 50)
            .await
            .unwrap();
        assert_eq!(still.total_results, resp.total_results);
    }

    #[tokio::test]
    async fn test_delete_then_query_is_empty() {
        let engine = engine_with(30, 0);
        let alice = owner("alice");
        engine.index_document(&alice, "course", &course_text()).await.unwrap();
        assert!(engine.delete_document(&alice, "course").await.unwrap());

        let resp = engine
            .query_document(&alice, "course", "recursion", 5)
            .await
            .unwrap();
        assert_eq!(resp.total_results, 0);

        let err = engine.delete_document(&alice, "course").await.unwrap_err();
        assert!(matches!(err, RagError::DocumentNotIndexed { .. }));
    }

    #[tokio::test]
    async fn test_positional_context_uses_insertion_order() {
        let engine = engine_with(30, 0);
        let alice = owner("alice");
        engine.index_document(&alice, "course", &course_text()).await.unwrap();

        let ctx = engine
            .get_document_context(&alice, "course", None, 2)
            .await
            .unwrap();
        let parts: Vec<&str> = ctx.split("\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("Recursion solves"));

        let blank_topic = engine
            .get_document_context(&alice, "course", Some("  "), 2)
            .await
            .unwrap();
        assert_eq!(blank_topic, ctx);
    }

    #[tokio::test]
    async fn test_topic_context_is_ranked() {
        let engine = engine_with(30, 0);
        let alice = owner("alice");
        engine.index_document(&alice, "course", &course_text()).await.unwrap();

        let ctx = engine
            .get_document_context(&alice, "course", Some("movable type books"), 1)
            .await
            .unwrap();
        assert!(ctx.contains("Movable type"));
        assert!(!ctx.contains("\n\n"));
    }

    #[tokio::test]
    async fn test_context_for_unknown_document_is_empty() {
        let engine = engine_with(30, 0);
        let ctx = engine
            .context_for(&owner("alice"), "missing", None, UseCase::Quiz)
            .await
            .unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_document_stats() {
        let engine = engine_with(30, 0);
        let alice = owner("alice");
        let report = engine.index_document(&alice, "course", &course_text()).await.unwrap();
        let stats = engine.document_stats(&alice, "course").await.unwrap();
        assert_eq!(stats.total_chunks, report.total_chunks);

        let all = engine.get_document_context(&alice, "course", None, 100).await.unwrap();
        let chunk_chars: usize = all.split("\n\n").map(|c| c.chars().count()).sum();
        assert_eq!(stats.stored_chars, chunk_chars);

        let err = engine.document_stats(&owner("bob"), "course").await.unwrap_err();
        assert!(matches!(err, RagError::DocumentNotIndexed { ref owner, .. } if owner == "bob"));
    }

    struct EchoGenerator;

    #[async_trait::async_trait]
    impl GenerationService for EchoGenerator {
        async fn generate(&self, context: &str, prompt: &str) -> Result<String, RagError> {
            Ok(format!("{}|{}", prompt, context))
        }
    }

    struct DownGenerator;

    #[async_trait::async_trait]
    impl GenerationService for DownGenerator {
        async fn generate(&self, _context: &str, _prompt: &str) -> Result<String, RagError> {
            Err(RagError::Generation("service unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_generate_with_passes_ranked_context() {
        let engine = engine_with(30, 0);
        let alice = owner("alice");
        engine.index_document(&alice, "course", &course_text()).await.unwrap();

        let out = engine
            .generate_with(&alice, "course", "chlorophyll sunlight", UseCase::Chat, &EchoGenerator)
            .await
            .unwrap();
        let (prompt, context) = out.split_once('|').unwrap();
        assert_eq!(prompt, "chlorophyll sunlight");
        assert!(context.starts_with("step that moves toward it."));

        let err = engine
            .generate_with(&alice, "course", "anything", UseCase::Quiz, &DownGenerator)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
    }

    #[test]
    fn test_use_case_defaults_and_parsing() {
        let d = TopKDefaults::default();
        assert_eq!("chat".parse::<UseCase>().unwrap().top_k(&d), 10);
        assert_eq!("summary".parse::<UseCase>().unwrap().top_k(&d), 15);
        assert_eq!("quiz".parse::<UseCase>().unwrap().top_k(&d), 30);
        assert!("essay".parse::<UseCase>().is_err());
        assert_eq!(UseCase::Summary.to_string(), "summary");
    }
}
