//! Engine behaviour against the SQLite backends, exercised through the
//! library API rather than the CLI.

use std::sync::Arc;

use coursemaster::app::App;
use coursemaster::config::Config;
use coursemaster_core::engine::UseCase;
use coursemaster_core::error::RagError;
use coursemaster_core::models::{MissedAnswer, OwnerId};
use tempfile::TempDir;

fn config(tmp: &TempDir) -> Config {
    let mut config = Config::minimal();
    config.store.path = tmp.path().join("cm.sqlite");
    config.embedding.provider = "hash".to_string();
    config.embedding.dims = Some(256);
    config.chunking.chunk_size = 20;
    config.chunking.overlap = 4;
    config
}

fn lecture(topic: &str, words: usize) -> String {
    (0..words)
        .map(|i| format!("{}{}", topic, i % 7))
        .collect::<Vec<_>>()
        .join(" ")
}

fn owner(id: &str) -> OwnerId {
    OwnerId::new(id).unwrap()
}

#[tokio::test]
async fn test_reindex_replaces_previous_chunks() {
    let tmp = TempDir::new().unwrap();
    let app = App::open(&config(&tmp)).await.unwrap();
    let alice = owner("alice");

    let first = app
        .engine
        .index_document(&alice, "notes", &lecture("graph", 100))
        .await
        .unwrap();
    let second = app
        .engine
        .index_document(&alice, "notes", &lecture("tree", 30))
        .await
        .unwrap();
    assert!(first.total_chunks > second.total_chunks);

    let stats = app.engine.document_stats(&alice, "notes").await.unwrap();
    assert_eq!(stats.total_chunks, second.total_chunks);

    let ctx = app
        .engine
        .get_document_context(&alice, "notes", None, 100)
        .await
        .unwrap();
    assert!(!ctx.contains("graph"));
    app.close().await;
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(&tmp);
    let alice = owner("alice");

    let app = App::open(&cfg).await.unwrap();
    app.engine
        .index_document(&alice, "notes", &lecture("heap", 50))
        .await
        .unwrap();
    app.close().await;

    let app = App::open(&cfg).await.unwrap();
    let resp = app
        .engine
        .query_document(&alice, "notes", "heap3", 2)
        .await
        .unwrap();
    assert_eq!(resp.total_results, 2);
    app.close().await;
}

#[tokio::test]
async fn test_concurrent_indexing_across_owners() {
    let tmp = TempDir::new().unwrap();
    let app = App::open(&config(&tmp)).await.unwrap();
    let engine = Arc::clone(&app.engine);

    let mut handles = Vec::new();
    for i in 0..6 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let who = owner(&format!("student{}", i));
            engine
                .index_document(&who, "shared", &lecture(&format!("topic{}x", i), 60))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for i in 0..6 {
        let who = owner(&format!("student{}", i));
        let resp = engine
            .query_document(&who, "shared", "anything", 50)
            .await
            .unwrap();
        assert!(resp.total_results > 0);
        assert!(resp
            .chunks
            .iter()
            .all(|c| c.metadata.owner == who.as_str() && c.text.contains(&format!("topic{}x", i))));
    }
    app.close().await;
}

#[tokio::test]
async fn test_concurrent_weakness_updates_do_not_lose_increments() {
    let tmp = TempDir::new().unwrap();
    let app = App::open(&config(&tmp)).await.unwrap();
    let alice = owner("alice");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let weaknesses = Arc::clone(&app.weaknesses);
        let alice = alice.clone();
        handles.push(tokio::spawn(async move {
            weaknesses
                .record_incorrect_answers(&alice, ["dynamic programming"])
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let rec = app
        .weaknesses
        .weakness(&alice, "dynamic programming")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rec.frequency, 8);
    assert_eq!(app.weaknesses.weakness_count(&alice).await.unwrap(), 1);
    app.close().await;
}

#[tokio::test]
async fn test_grading_falls_back_to_quiz_topic() {
    let tmp = TempDir::new().unwrap();
    let app = App::open(&config(&tmp)).await.unwrap();
    let alice = owner("alice");

    let missed = vec![
        MissedAnswer {
            question: "What is memoization?".to_string(),
            user_answer: "A sorting method".to_string(),
            correct_answer: "Caching subproblem results".to_string(),
            concept: None,
        },
        MissedAnswer {
            question: "Define a base case.".to_string(),
            user_answer: "The last line".to_string(),
            correct_answer: "The case solved without recursion".to_string(),
            concept: Some("recursion".to_string()),
        },
    ];
    let concepts = app
        .weaknesses
        .record_grading(&alice, &missed, Some("dynamic programming"), None)
        .await
        .unwrap();
    let names: Vec<&str> = concepts.iter().map(String::as_str).collect();
    assert_eq!(names, vec!["dynamic programming", "recursion"]);

    let top = app.weaknesses.top_weaknesses(&alice, 10).await.unwrap();
    assert_eq!(top.len(), 2);
    app.close().await;
}

#[tokio::test]
async fn test_quiz_context_uses_configured_top_k() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = config(&tmp);
    cfg.retrieval.quiz_top_k = 2;
    let app = App::open(&cfg).await.unwrap();
    let alice = owner("alice");

    app.engine
        .index_document(&alice, "notes", &lecture("sort", 80))
        .await
        .unwrap();
    let ctx = app
        .engine
        .context_for(&alice, "notes", None, UseCase::Quiz)
        .await
        .unwrap();
    assert_eq!(ctx.split("\n\n").count(), 2);

    let err = app.engine.delete_document(&owner("bob"), "notes").await.unwrap_err();
    assert!(matches!(err, RagError::DocumentNotIndexed { .. }));
    app.close().await;
}
