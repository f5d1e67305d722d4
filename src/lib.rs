//! # CourseMaster
//!
//! Per-user document retrieval for a study assistant: uploaded course
//! material is split into overlapping word windows, embedded, and stored
//! in one collection per student; questions, summaries, and quizzes are
//! grounded in the chunks most similar to a topic. Quiz grading feeds a
//! per-concept weakness table.
//!
//! The engine itself lives in `coursemaster-core`. This crate supplies the
//! SQLite store, the embedding providers, text extraction, configuration,
//! logging, and the `cm` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Extract  │──▶│ Chunk+Embed  │──▶│ SQLite chunks │
//! │ PDF/text │   │  (indexer)   │   │ per owner     │
//! └──────────┘   └──────────────┘   └──────┬────────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌───────────┐
//!                 │  query   │       │  context  │──▶ generation
//!                 └──────────┘       └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cm init
//! cm index alice lecture-3 ./lecture3.pdf
//! cm query alice lecture-3 "what is a base case?"
//! cm context alice lecture-3 --use-case quiz
//! cm weakness record alice recursion "base cases"
//! cm weakness list alice
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite chunk store |
//! | [`sqlite_weakness`] | SQLite weakness table |
//! | [`embedding`] | Embedding providers |
//! | [`extract`] | PDF and text extraction |
//! | [`app`] | Service wiring |
//! | [`commands`] | CLI command implementations |

pub mod app;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod logging;
pub mod migrate;
pub mod sqlite_store;
pub mod sqlite_weakness;
