//! FAQ indexing pipeline.
//!
//! Coordinates the full indexing flow: FAQ file → document text → embedding
//! → batched upsert. Document ids are positional (`faq_<i>`), so re-running
//! the indexer overwrites the previous vectors in place. The run is not
//! transactional: if an embedding or upsert fails midway, batches already
//! written stay in the index and the error is returned.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{generate_embedding, EmbeddingProvider, EmbeddingTask};
use crate::faq::{document_id, document_metadata, document_text, load_faq_file};
use crate::models::{IndexSpec, IndexedDocument};
use crate::progress::{IndexProgressEvent, IndexProgressReporter, NoProgress};
use crate::retry::RetryPolicy;
use crate::vector_index::{ensure_index, index_spec, VectorIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Completed,
    /// The FAQ file was missing; nothing was touched.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub outcome: IndexOutcome,
    pub entries: usize,
    pub upserted: usize,
    pub batches: usize,
    /// SHA-256 of the FAQ file, when it was read.
    pub source_digest: Option<String>,
}

impl IndexReport {
    fn aborted() -> Self {
        Self {
            outcome: IndexOutcome::Aborted,
            entries: 0,
            upserted: 0,
            batches: 0,
            source_digest: None,
        }
    }
}

/// Batched FAQ indexer. Build one with [`Indexer::new`], optionally attach a
/// progress reporter, then call [`index_faq_data`](Indexer::index_faq_data).
pub struct Indexer {
    faq_path: PathBuf,
    batch_size: usize,
    spec: IndexSpec,
    readiness: RetryPolicy,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    progress: Box<dyn IndexProgressReporter>,
}

impl Indexer {
    /// Indexer for `data.faq_path` writing into the configured index, with
    /// `index.batch_size` vectors per upsert and progress reporting off.
    pub fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            faq_path: config.data.faq_path.clone(),
            batch_size: config.index.batch_size.max(1),
            spec: index_spec(config),
            readiness: config.index.readiness.policy(),
            embedder,
            index,
            progress: Box::new(NoProgress),
        }
    }

    /// Replace the progress reporter.
    pub fn with_progress(mut self, progress: Box<dyn IndexProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Load the FAQ file, embed every entry, and upsert the vectors in
    /// batches of at most `index.batch_size`.
    ///
    /// A missing FAQ file is logged and reported as
    /// [`IndexOutcome::Aborted`] without touching the index.
    ///
    /// # Errors
    ///
    /// Malformed FAQ files, index readiness timeouts
    /// ([`RagError::IndexNotReady`](crate::error::RagError)), and embedding or
    /// upsert failures. Batches upserted before the failure are kept.
    pub async fn index_faq_data(&self) -> Result<IndexReport> {
        tracing::info!(path = %self.faq_path.display(), "starting FAQ data indexing");

        let dataset = match load_faq_file(&self.faq_path)? {
            Some(d) => d,
            None => {
                tracing::error!(
                    path = %self.faq_path.display(),
                    "FAQ file not found, indexing aborted"
                );
                return Ok(IndexReport::aborted());
            }
        };

        let total = dataset.entries.len();
        let index_name = self.spec.name.clone();
        self.progress.report(IndexProgressEvent::Loaded {
            index: index_name.clone(),
            entries: total as u64,
        });
        tracing::info!(
            entries = total,
            digest = %dataset.digest,
            "loaded FAQ file"
        );

        ensure_index(self.index.as_ref(), &self.spec, &self.readiness).await?;

        let mut pending: Vec<IndexedDocument> = Vec::with_capacity(self.batch_size.min(total));
        let mut upserted = 0usize;
        let mut batches = 0usize;

        for (i, entry) in dataset.entries.iter().enumerate() {
            let text = document_text(entry);
            let values = generate_embedding(
                self.embedder.as_ref(),
                &text,
                EmbeddingTask::RetrievalDocument,
            )
            .await?;

            pending.push(IndexedDocument {
                id: document_id(i),
                values,
                metadata: document_metadata(entry, &text),
            });
            self.progress.report(IndexProgressEvent::Embedded {
                index: index_name.clone(),
                n: (i + 1) as u64,
                total: total as u64,
            });

            if pending.len() >= self.batch_size {
                upserted += self.flush(&mut pending, batches + 1, upserted, total).await?;
                batches += 1;
            }
        }

        if !pending.is_empty() {
            upserted += self.flush(&mut pending, batches + 1, upserted, total).await?;
            batches += 1;
        }

        tracing::info!(
            index = %index_name,
            entries = total,
            upserted,
            batches,
            "indexing complete"
        );

        Ok(IndexReport {
            outcome: IndexOutcome::Completed,
            entries: total,
            upserted,
            batches,
            source_digest: Some(dataset.digest),
        })
    }

    /// Upsert and clear `pending`. Returns the number of vectors written.
    async fn flush(
        &self,
        pending: &mut Vec<IndexedDocument>,
        batch: usize,
        upserted_before: usize,
        total: usize,
    ) -> Result<usize> {
        let size = pending.len();
        let written = self.index.upsert(pending.as_slice()).await?;
        pending.clear();

        tracing::debug!(batch, size, written, "upserted batch");
        self.progress.report(IndexProgressEvent::Upserted {
            index: self.spec.name.clone(),
            batch: batch as u64,
            size: size as u64,
            upserted: (upserted_before + written) as u64,
            total: total as u64,
        });
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use crate::models::{IndexDescription, QueryMatch};
    use crate::vector_index::memory::InMemoryIndex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Deterministic 3-d embedding; fails on the configured call number.
    struct FakeEmbedder {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl FakeEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        fn model_name(&self) -> &str {
            "fake"
        }
        async fn embed(&self, text: &str, _task: EmbeddingTask) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(call) {
                return Err(RagError::Api {
                    service: "fake",
                    status: 500,
                    body: "boom".to_string(),
                }
                .into());
            }
            Ok(vec![text.len() as f32, 1.0, 0.5])
        }
    }

    /// Wraps the in-memory index and records every call.
    struct RecordingIndex {
        inner: InMemoryIndex,
        batches: Mutex<Vec<Vec<String>>>,
        creates: AtomicUsize,
    }

    impl RecordingIndex {
        fn new() -> Self {
            Self {
                inner: InMemoryIndex::new("clinic-faqs-index"),
                batches: Mutex::new(Vec::new()),
                creates: AtomicUsize::new(0),
            }
        }

        fn batches(&self) -> Vec<Vec<String>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        fn index_name(&self) -> &str {
            self.inner.index_name()
        }
        async fn list_indexes(&self) -> Result<Vec<String>> {
            self.inner.list_indexes().await
        }
        async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create_index(spec).await
        }
        async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
            self.inner.describe_index(name).await
        }
        async fn upsert(&self, documents: &[IndexedDocument]) -> Result<usize> {
            self.batches
                .lock()
                .unwrap()
                .push(documents.iter().map(|d| d.id.clone()).collect());
            self.inner.upsert(documents).await
        }
        async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
            self.inner.query(vector, top_k).await
        }
    }

    #[derive(Clone, Default)]
    struct RecordingProgress {
        events: Arc<Mutex<Vec<IndexProgressEvent>>>,
    }

    impl IndexProgressReporter for RecordingProgress {
        fn report(&self, event: IndexProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn write_faq(tmp: &TempDir, count: usize) -> PathBuf {
        let entries: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "question": format!("Question {}", i),
                    "answer": format!("Answer {}", i),
                    "topic": if i % 2 == 0 { "Insurance" } else { "Appointments" },
                })
            })
            .collect();
        let path = tmp.path().join("clinic_info.json");
        std::fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();
        path
    }

    fn config_for(path: PathBuf) -> Config {
        let mut config = Config::default();
        config.data.faq_path = path;
        config.index.dimension = 3;
        config.index.provider = "memory".to_string();
        config
    }

    #[tokio::test]
    async fn batches_of_at_most_one_hundred() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(write_faq(&tmp, 250));
        let index = Arc::new(RecordingIndex::new());
        let embedder = Arc::new(FakeEmbedder::new());

        let report = Indexer::new(&config, embedder.clone(), index.clone())
            .index_faq_data()
            .await
            .unwrap();

        assert_eq!(report.outcome, IndexOutcome::Completed);
        assert_eq!(report.entries, 250);
        assert_eq!(report.upserted, 250);
        assert_eq!(report.batches, 3);
        assert!(report.source_digest.is_some());

        let sizes: Vec<usize> = index.batches().iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);

        let ids: Vec<String> = index.batches().concat();
        let expected: Vec<String> = (0..250).map(|i| format!("faq_{}", i)).collect();
        assert_eq!(ids, expected);

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 250);
        assert_eq!(index.creates.load(Ordering::SeqCst), 1);
        assert_eq!(index.inner.vector_count(), 250);
    }

    #[tokio::test]
    async fn exact_multiple_has_no_empty_trailing_batch() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(write_faq(&tmp, 100));
        let index = Arc::new(RecordingIndex::new());

        let report = Indexer::new(&config, Arc::new(FakeEmbedder::new()), index.clone())
            .index_faq_data()
            .await
            .unwrap();

        assert_eq!(report.batches, 1);
        assert_eq!(index.batches().len(), 1);
    }

    #[tokio::test]
    async fn stores_document_text_and_topic() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(write_faq(&tmp, 2));
        let index = Arc::new(RecordingIndex::new());

        Indexer::new(&config, Arc::new(FakeEmbedder::new()), index.clone())
            .index_faq_data()
            .await
            .unwrap();

        let doc = index.inner.fetch("faq_1").unwrap();
        assert_eq!(doc.metadata.topic, "Appointments");
        assert_eq!(
            doc.metadata.original_text,
            "Q: Question 1. A: Answer 1 (Topic: Appointments)"
        );
    }

    #[tokio::test]
    async fn rerun_overwrites_same_ids() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(write_faq(&tmp, 5));
        let index = Arc::new(RecordingIndex::new());
        let indexer = Indexer::new(&config, Arc::new(FakeEmbedder::new()), index.clone());

        indexer.index_faq_data().await.unwrap();
        indexer.index_faq_data().await.unwrap();

        assert_eq!(index.inner.vector_count(), 5);
        assert_eq!(index.creates.load(Ordering::SeqCst), 1);
        assert_eq!(index.batches()[0], index.batches()[1]);
    }

    #[tokio::test]
    async fn missing_file_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path().join("absent.json"));
        let index = Arc::new(RecordingIndex::new());
        let embedder = Arc::new(FakeEmbedder::new());

        let report = Indexer::new(&config, embedder.clone(), index.clone())
            .index_faq_data()
            .await
            .unwrap();

        assert_eq!(report.outcome, IndexOutcome::Aborted);
        assert!(index.batches().is_empty());
        assert_eq!(index.creates.load(Ordering::SeqCst), 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(index.inner.list_indexes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_keeps_earlier_batches() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_for(write_faq(&tmp, 30));
        config.index.batch_size = 10;
        let index = Arc::new(RecordingIndex::new());
        let embedder = Arc::new(FakeEmbedder {
            calls: AtomicUsize::new(0),
            fail_on: Some(25),
        });

        let err = Indexer::new(&config, embedder, index.clone())
            .index_faq_data()
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::Api { status: 500, .. })
        ));
        assert_eq!(index.batches().len(), 2);
        assert_eq!(index.inner.vector_count(), 20);
    }

    #[tokio::test]
    async fn empty_file_creates_index_without_upserts() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(write_faq(&tmp, 0));
        let index = Arc::new(RecordingIndex::new());

        let report = Indexer::new(&config, Arc::new(FakeEmbedder::new()), index.clone())
            .index_faq_data()
            .await
            .unwrap();

        assert_eq!(report.outcome, IndexOutcome::Completed);
        assert_eq!(report.batches, 0);
        assert!(index.batches().is_empty());
        assert_eq!(index.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reports_progress_in_order() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_for(write_faq(&tmp, 5));
        config.index.batch_size = 2;
        let index_name = config.index.name.clone();
        let progress = RecordingProgress::default();

        Indexer::new(&config, Arc::new(FakeEmbedder::new()), Arc::new(RecordingIndex::new()))
            .with_progress(Box::new(progress.clone()))
            .index_faq_data()
            .await
            .unwrap();

        let embedded = |n| IndexProgressEvent::Embedded {
            index: index_name.clone(),
            n,
            total: 5,
        };
        let upserted = |batch, size, upserted| IndexProgressEvent::Upserted {
            index: index_name.clone(),
            batch,
            size,
            upserted,
            total: 5,
        };
        let expected = vec![
            IndexProgressEvent::Loaded {
                index: index_name.clone(),
                entries: 5,
            },
            embedded(1),
            embedded(2),
            upserted(1, 2, 2),
            embedded(3),
            embedded(4),
            upserted(2, 2, 4),
            embedded(5),
            upserted(3, 1, 5),
        ];
        assert_eq!(*progress.events.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn missing_file_reports_no_progress() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path().join("absent.json"));
        let progress = RecordingProgress::default();

        Indexer::new(&config, Arc::new(FakeEmbedder::new()), Arc::new(RecordingIndex::new()))
            .with_progress(Box::new(progress.clone()))
            .index_faq_data()
            .await
            .unwrap();

        assert!(progress.events.lock().unwrap().is_empty());
    }
}
