//! In-memory [`VectorIndex`] implementation for tests and offline runs.
//!
//! Uses `HashMap` and `BTreeMap` behind `std::sync::RwLock` for thread
//! safety. Query is brute-force scoring over all stored vectors with the
//! index metric. Like a managed index, it rejects vectors whose dimension
//! differs from the index dimension and can be told to report "not ready"
//! for a number of describes after creation.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::RagError;
use crate::models::{DocumentMetadata, IndexDescription, IndexSpec, IndexedDocument, QueryMatch};

use super::VectorIndex;

const SERVICE: &str = "memory index";

struct StoredVector {
    values: Vec<f32>,
    metadata: DocumentMetadata,
}

struct StoredIndex {
    spec: IndexSpec,
    vectors: BTreeMap<String, StoredVector>,
    /// Describes left before the index reports ready.
    warming: u32,
}

/// In-memory vector index.
pub struct InMemoryIndex {
    name: String,
    ready_after: u32,
    indexes: RwLock<HashMap<String, StoredIndex>>,
    describes: AtomicU32,
}

impl InMemoryIndex {
    /// `name` is the index targeted by `upsert` and `query`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ready_after: 0,
            indexes: RwLock::new(HashMap::new()),
            describes: AtomicU32::new(0),
        }
    }

    /// Newly created indexes report not-ready for the first `describes`
    /// describe calls.
    pub fn with_ready_after(mut self, describes: u32) -> Self {
        self.ready_after = describes;
        self
    }

    /// Total number of `describe_index` calls served.
    pub fn describe_count(&self) -> u32 {
        self.describes.load(Ordering::SeqCst)
    }

    /// Number of vectors in the target index (0 if it does not exist).
    pub fn vector_count(&self) -> usize {
        self.read()
            .ok()
            .and_then(|indexes| indexes.get(&self.name).map(|idx| idx.vectors.len()))
            .unwrap_or(0)
    }

    /// Look up a stored vector in the target index.
    pub fn fetch(&self, id: &str) -> Option<IndexedDocument> {
        let indexes = self.read().ok()?;
        let stored = indexes.get(&self.name)?.vectors.get(id)?;
        Some(IndexedDocument {
            id: id.to_string(),
            values: stored.values.clone(),
            metadata: stored.metadata.clone(),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoredIndex>>> {
        self.indexes
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredIndex>>> {
        self.indexes
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))
    }
}

fn not_found(name: &str) -> anyhow::Error {
    RagError::Api {
        service: SERVICE,
        status: 404,
        body: format!("index '{}' not found", name),
    }
    .into()
}

fn dimension_mismatch(got: usize, expected: usize) -> anyhow::Error {
    RagError::Api {
        service: SERVICE,
        status: 400,
        body: format!(
            "Vector dimension {} does not match the dimension of the index {}",
            got, expected
        ),
    }
    .into()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn index_name(&self) -> &str {
        &self.name
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let mut indexes = self.write()?;
        if indexes.contains_key(&spec.name) {
            return Err(RagError::Api {
                service: SERVICE,
                status: 409,
                body: format!("index '{}' already exists", spec.name),
            }
            .into());
        }
        indexes.insert(
            spec.name.clone(),
            StoredIndex {
                spec: spec.clone(),
                vectors: BTreeMap::new(),
                warming: self.ready_after,
            },
        );
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        let mut indexes = self.write()?;
        let stored = indexes.get_mut(name).ok_or_else(|| not_found(name))?;

        let ready = stored.warming == 0;
        if !ready {
            stored.warming -= 1;
        }

        Ok(IndexDescription {
            name: stored.spec.name.clone(),
            dimension: stored.spec.dimension,
            metric: stored.spec.metric.clone(),
            ready,
            state: if ready { "Ready" } else { "Initializing" }.to_string(),
            host: None,
        })
    }

    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<usize> {
        let mut indexes = self.write()?;
        let stored = indexes
            .get_mut(&self.name)
            .ok_or_else(|| not_found(&self.name))?;

        let expected = stored.spec.dimension;
        if let Some(bad) = documents.iter().find(|d| d.values.len() != expected) {
            return Err(dimension_mismatch(bad.values.len(), expected));
        }

        for doc in documents {
            stored.vectors.insert(
                doc.id.clone(),
                StoredVector {
                    values: doc.values.clone(),
                    metadata: doc.metadata.clone(),
                },
            );
        }
        Ok(documents.len())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let indexes = self.read()?;
        let stored = indexes.get(&self.name).ok_or_else(|| not_found(&self.name))?;

        if vector.len() != stored.spec.dimension {
            return Err(dimension_mismatch(vector.len(), stored.spec.dimension));
        }

        let metric = stored.spec.metric.as_str();
        let mut matches: Vec<QueryMatch> = stored
            .vectors
            .iter()
            .map(|(id, sv)| {
                let score = match metric {
                    "dotproduct" => dot(vector, &sv.values),
                    "euclidean" => euclidean(vector, &sv.values),
                    _ => cosine_similarity(vector, &sv.values),
                };
                QueryMatch {
                    id: id.clone(),
                    score,
                    metadata: Some(sv.metadata.clone()),
                }
            })
            .collect();

        // Euclidean distance ranks ascending, similarity metrics descending.
        matches.sort_by(|a, b| {
            let ord = if metric == "euclidean" {
                a.score.partial_cmp(&b.score)
            } else {
                b.score.partial_cmp(&a.score)
            };
            ord.unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}
