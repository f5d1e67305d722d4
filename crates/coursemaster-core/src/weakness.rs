//! Per-user concept weakness tracking.
//!
//! Each grading event contributes a set of missed concepts: the tags
//! attached to the missed questions, unioned with whatever an external
//! [`ConceptClassifier`] derives from the missed question/answer pairs.
//! Every distinct concept increments the owner's [`WeaknessRecord`] for
//! it (creating the record with `frequency = 1` on the first miss) and
//! overwrites `last_incorrect_at`.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{RagError, StoreError};
use crate::models::{MissedAnswer, OwnerId, WeaknessRecord};

/// Default number of records returned by [`WeaknessAggregator::top_weaknesses`].
pub const DEFAULT_TOP_WEAKNESSES: usize = 10;

/// Persistence for weakness records.
#[async_trait]
pub trait WeaknessStore: Send + Sync {
    /// Increment (or create with frequency 1) the record of every concept
    /// in `concepts` for `owner`, stamping `at`. Applied as one unit.
    async fn record_misses(
        &self,
        owner: &OwnerId,
        concepts: &[String],
        at: DateTime<Utc>,
    ) -> Result<Vec<WeaknessRecord>, StoreError>;

    async fn get(
        &self,
        owner: &OwnerId,
        concept: &str,
    ) -> Result<Option<WeaknessRecord>, StoreError>;

    /// Records of `owner` by descending frequency, ties by concept.
    async fn top(&self, owner: &OwnerId, limit: usize) -> Result<Vec<WeaknessRecord>, StoreError>;

    async fn count(&self, owner: &OwnerId) -> Result<usize, StoreError>;
}

/// External analysis step that names the concepts behind missed answers.
#[async_trait]
pub trait ConceptClassifier: Send + Sync {
    async fn classify(&self, missed: &[MissedAnswer]) -> Result<Vec<String>, RagError>;
}

/// Union two concept sources, trimming and dropping empty entries.
pub fn merge_concepts<A, B>(tags: A, classified: B) -> BTreeSet<String>
where
    A: IntoIterator,
    A::Item: AsRef<str>,
    B: IntoIterator,
    B::Item: AsRef<str>,
{
    tags.into_iter()
        .map(|c| c.as_ref().trim().to_string())
        .chain(classified.into_iter().map(|c| c.as_ref().trim().to_string()))
        .filter(|c| !c.is_empty())
        .collect()
}

/// Merges grading outcomes into the per-user frequency table.
pub struct WeaknessAggregator {
    store: Arc<dyn WeaknessStore>,
}

impl WeaknessAggregator {
    pub fn new(store: Arc<dyn WeaknessStore>) -> Self {
        Self { store }
    }

    /// Record one miss of every distinct concept in `concepts`, now.
    pub async fn record_incorrect_answers<I>(
        &self,
        owner: &OwnerId,
        concepts: I,
    ) -> Result<Vec<WeaknessRecord>, RagError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.record_incorrect_answers_at(owner, concepts, Utc::now())
            .await
    }

    /// Same as [`record_incorrect_answers`](Self::record_incorrect_answers)
    /// with an explicit aggregation time.
    pub async fn record_incorrect_answers_at<I>(
        &self,
        owner: &OwnerId,
        concepts: I,
        at: DateTime<Utc>,
    ) -> Result<Vec<WeaknessRecord>, RagError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let distinct: Vec<String> = merge_concepts(concepts, std::iter::empty::<&str>())
            .into_iter()
            .collect();
        if distinct.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.store.record_misses(owner, &distinct, at).await?;
        info!(owner = %owner, concepts = distinct.len(), "recorded weaknesses");
        Ok(records)
    }

    /// Derive concepts from one grading event and record them.
    ///
    /// Tags come from each missed answer's `concept`, falling back to
    /// `quiz_topic`. If a classifier is given, its concepts are unioned in.
    /// Returns the merged concept set.
    pub async fn record_grading(
        &self,
        owner: &OwnerId,
        missed: &[MissedAnswer],
        quiz_topic: Option<&str>,
        classifier: Option<&dyn ConceptClassifier>,
    ) -> Result<BTreeSet<String>, RagError> {
        if missed.is_empty() {
            return Ok(BTreeSet::new());
        }

        let tags = missed
            .iter()
            .filter_map(|m| m.concept.as_deref().or(quiz_topic));
        let classified = match classifier {
            Some(c) => c.classify(missed).await?,
            None => Vec::new(),
        };
        let concepts = merge_concepts(tags, &classified);

        self.record_incorrect_answers(owner, &concepts).await?;
        Ok(concepts)
    }

    pub async fn top_weaknesses(
        &self,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<WeaknessRecord>, RagError> {
        Ok(self.store.top(owner, limit).await?)
    }

    pub async fn weakness(
        &self,
        owner: &OwnerId,
        concept: &str,
    ) -> Result<Option<WeaknessRecord>, RagError> {
        Ok(self.store.get(owner, concept.trim()).await?)
    }

    pub async fn weakness_count(&self, owner: &OwnerId) -> Result<usize, RagError> {
        Ok(self.store.count(owner).await?)
    }
}

/// In-memory [`WeaknessStore`] keyed by `(owner, concept)`.
#[derive(Default)]
pub struct InMemoryWeaknessStore {
    records: RwLock<HashMap<(String, String), WeaknessRecord>>,
}

impl InMemoryWeaknessStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WeaknessStore for InMemoryWeaknessStore {
    async fn record_misses(
        &self,
        owner: &OwnerId,
        concepts: &[String],
        at: DateTime<Utc>,
    ) -> Result<Vec<WeaknessRecord>, StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Write("weakness store lock poisoned".to_string()))?;

        let updated = concepts
            .iter()
            .map(|concept| {
                let record = records
                    .entry((owner.to_string(), concept.clone()))
                    .and_modify(|r| {
                        r.frequency += 1;
                        r.last_incorrect_at = at;
                    })
                    .or_insert_with(|| WeaknessRecord {
                        owner: owner.to_string(),
                        concept: concept.clone(),
                        frequency: 1,
                        last_incorrect_at: at,
                    });
                record.clone()
            })
            .collect();
        Ok(updated)
    }

    async fn get(
        &self,
        owner: &OwnerId,
        concept: &str,
    ) -> Result<Option<WeaknessRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Query("weakness store lock poisoned".to_string()))?;
        Ok(records
            .get(&(owner.to_string(), concept.to_string()))
            .cloned())
    }

    async fn top(&self, owner: &OwnerId, limit: usize) -> Result<Vec<WeaknessRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Query("weakness store lock poisoned".to_string()))?;
        let mut mine: Vec<WeaknessRecord> = records
            .values()
            .filter(|r| r.owner == owner.as_str())
            .cloned()
            .collect();
        mine.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.concept.cmp(&b.concept))
        });
        mine.truncate(limit);
        Ok(mine)
    }

    async fn count(&self, owner: &OwnerId) -> Result<usize, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Query("weakness store lock poisoned".to_string()))?;
        Ok(records.keys().filter(|(o, _)| o == owner.as_str()).count())
    }
}
