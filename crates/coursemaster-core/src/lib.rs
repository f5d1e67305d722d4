//! # CourseMaster Core
//!
//! Retrieval engine for CourseMaster study material: word-window
//! chunking, the tenant-scoped vector store abstraction, similarity
//! retrieval, context assembly, and per-student weakness aggregation.
//!
//! This crate has no database, HTTP, or filesystem dependencies. The
//! `coursemaster` application crate supplies a SQLite [`store::Store`],
//! remote [`embedding::Embedder`] providers, and the `cm` CLI.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use coursemaster_core::embedding::HashingEmbedder;
//! use coursemaster_core::engine::{EngineSettings, RagEngine};
//! use coursemaster_core::models::OwnerId;
//! use coursemaster_core::store::memory::InMemoryStore;
//!
//! # tokio_test_block(async {
//! let engine = RagEngine::new(
//!     Arc::new(HashingEmbedder::new(64)),
//!     Arc::new(InMemoryStore::new()),
//!     EngineSettings::default(),
//! ).unwrap();
//!
//! let alice = OwnerId::new("alice").unwrap();
//! let text = "Binary search halves the search interval on every comparison step.";
//! engine.index_document(&alice, "notes", text).await.unwrap();
//!
//! let hits = engine.query_document(&alice, "notes", "binary search", 3).await.unwrap();
//! assert_eq!(hits.total_results, 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod models;
pub mod retrieval;
pub mod store;
pub mod tenant;
pub mod weakness;
