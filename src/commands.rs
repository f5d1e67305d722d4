//! `cm` command implementations.
//!
//! Each `run_*` function opens the [`App`], performs one engine operation,
//! and prints the result to stdout. Engine failures are reported on
//! stderr and turn into a non-zero exit, except where noted.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::warn;

use coursemaster_core::engine::UseCase;
use coursemaster_core::error::RagError;
use coursemaster_core::models::{IndexOutcome, OwnerId, QueryOutcome};

use crate::app::App;
use crate::config::Config;
use crate::extract::extract_file;

/// Extract `path` and index it as `file_id` for `owner`.
///
/// Prints the `{success, total_chunks, total_chars}` outcome as JSON in
/// both the success and failure case; a failure still exits non-zero.
pub async fn run_index(config: &Config, owner: &str, file_id: &str, path: &Path) -> Result<()> {
    let owner = OwnerId::new(owner)?;
    let text = extract_file(path)?;

    let app = App::open(config).await?;
    let result = app.engine.index_document(&owner, file_id, &text).await;
    app.close().await;

    println!("{}", serde_json::to_string_pretty(&IndexOutcome::from(&result))?);
    result?;
    Ok(())
}

/// Top-k similarity search within one document.
pub async fn run_query(
    config: &Config,
    owner: &str,
    file_id: &str,
    query: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let owner = OwnerId::new(owner)?;
    let app = App::open(config).await?;
    let top_k = top_k.unwrap_or(app.engine.settings().top_k.query);
    let result = app.engine.query_document(&owner, file_id, query, top_k).await;
    app.close().await;

    if json {
        let failed = result.is_err();
        println!("{}", serde_json::to_string_pretty(&QueryOutcome::from(result))?);
        if failed {
            bail!("query failed");
        }
        return Ok(());
    }

    let response = result?;
    if response.chunks.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, entry) in response.chunks.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} chunk {}",
            rank + 1,
            entry.score,
            entry.metadata.file_id,
            entry.metadata.chunk_index
        );
        println!("    {}", preview(&entry.text, 240));
        println!();
    }
    Ok(())
}

/// Print the assembled context string.
///
/// An explicit `--top-k` wins over the use-case default.
pub async fn run_context(
    config: &Config,
    owner: &str,
    file_id: &str,
    topic: Option<&str>,
    use_case: UseCase,
    top_k: Option<usize>,
) -> Result<()> {
    let owner = OwnerId::new(owner)?;
    let app = App::open(config).await?;
    let context = match top_k {
        Some(k) => {
            app.engine
                .get_document_context(&owner, file_id, topic, k)
                .await?
        }
        None => app.engine.context_for(&owner, file_id, topic, use_case).await?,
    };
    app.close().await;

    println!("{}", context);
    Ok(())
}

/// Remove a document's chunks. Deleting an unindexed document is a
/// warning, not a failure.
pub async fn run_delete(config: &Config, owner: &str, file_id: &str) -> Result<()> {
    let owner = OwnerId::new(owner)?;
    let app = App::open(config).await?;
    let result = app.engine.delete_document(&owner, file_id).await;
    app.close().await;

    match result {
        Ok(_) => println!("Deleted {}.", file_id),
        Err(RagError::DocumentNotIndexed { .. }) => {
            warn!(owner = %owner, file_id, "delete requested for unindexed document");
            println!("Nothing to delete for {}.", file_id);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub async fn run_stats(config: &Config, owner: &str, file_id: &str) -> Result<()> {
    let owner = OwnerId::new(owner)?;
    let app = App::open(config).await?;
    let result = app.engine.document_stats(&owner, file_id).await;
    app.close().await;

    let stats = result?;
    println!("--- Document ---");
    println!("owner:        {}", stats.owner);
    println!("file_id:      {}", stats.file_id);
    println!("chunks:       {}", stats.total_chunks);
    println!("stored chars: {}", stats.stored_chars);
    Ok(())
}

/// Record one grading event's missed concepts.
pub async fn run_weakness_record(config: &Config, owner: &str, concepts: &[String]) -> Result<()> {
    let owner = OwnerId::new(owner)?;
    let app = App::open(config).await?;
    let result = app.weaknesses.record_incorrect_answers(&owner, concepts).await;
    app.close().await;

    for record in result? {
        println!("{:<32} {}", record.concept, record.frequency);
    }
    Ok(())
}

/// Most frequent weaknesses first, with the total number tracked.
pub async fn run_weakness_list(
    config: &Config,
    owner: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    let owner = OwnerId::new(owner)?;
    let app = App::open(config).await?;
    let top = app.weaknesses.top_weaknesses(&owner, limit).await;
    let total = app.weaknesses.weakness_count(&owner).await;
    app.close().await;
    let (top, total) = (top?, total?);

    if json {
        let body = serde_json::json!({ "weaknesses": top, "total_weaknesses": total });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if top.is_empty() {
        println!("No weaknesses recorded.");
        return Ok(());
    }
    for record in &top {
        println!(
            "{:<32} {:>4}  last missed {}",
            record.concept,
            record.frequency,
            record.last_incorrect_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!("({} of {} concepts)", top.len(), total);
    Ok(())
}

/// First `max` characters of `text` on one line.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}...", cut)
}
