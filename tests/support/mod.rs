//! Shared fixtures for the integration tests.

use aas_embedding_service::config::{Config, EmbeddingsBackend, EmbeddingsDevice};
use aas_embedding_service::embeddings::hash::HashEmbedder;
use aas_embedding_service::extract::TextConverter;
use aas_embedding_service::fetch::AttachmentFetcher;
use aas_embedding_service::index::memory::MemoryIndex;
use aas_embedding_service::index::{ChunkRecord, DocumentIndex, RecordFilter, SearchHit};
use aas_embedding_service::ingest::IngestPipeline;
use aas_embedding_service::metrics::MetricsRegistry;
use aas_embedding_service::model::Event;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

/// Counts downloads and writes a fixed placeholder body.
pub struct CountingFetcher {
    pub calls: AtomicUsize,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttachmentFetcher for CountingFetcher {
    async fn fetch(&self, _url: &str, dest: &Path) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dest, b"%PDF-1.4 placeholder").await?;
        Ok(20)
    }
}

/// Returns whatever text is currently configured, so tests can simulate a
/// document changing between events.
pub struct ScriptedConverter {
    text: Mutex<String>,
}

impl ScriptedConverter {
    pub fn new(text: &str) -> Self {
        Self {
            text: Mutex::new(text.to_string()),
        }
    }

    pub fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
    }
}

#[async_trait]
impl TextConverter for ScriptedConverter {
    async fn convert_to_text(&self, _path: &Path) -> Result<String> {
        Ok(self.text.lock().unwrap().clone())
    }
}

/// Delegates to a MemoryIndex but fails every delete, for exercising the
/// swallow-and-count behavior.
pub struct FailingDeleteIndex {
    pub inner: MemoryIndex,
}

#[async_trait]
impl DocumentIndex for FailingDeleteIndex {
    async fn collection_exists(&self) -> Result<bool> {
        self.inner.collection_exists().await
    }

    async fn ensure_collection(&self, dim: usize) -> Result<()> {
        self.inner.ensure_collection(dim).await
    }

    async fn has_document(&self, submodel_id: &str, id_short_path: &str) -> Result<bool> {
        self.inner.has_document(submodel_id, id_short_path).await
    }

    async fn insert_chunks(&self, records: &[ChunkRecord]) -> Result<()> {
        self.inner.insert_chunks(records).await
    }

    async fn delete_matching(&self, _filter: &RecordFilter) -> Result<()> {
        Err(anyhow!("simulated index outage"))
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        self.inner.search(query_vector, filter, limit).await
    }
}

pub fn test_config() -> Config {
    Config {
        events_addr: "127.0.0.1:0".parse().unwrap(),
        submodel_repo_url: "http://repo".to_string(),
        vector_db_path: std::env::temp_dir().join("unused"),
        collection_name: "docs".to_string(),
        embeddings_backend: EmbeddingsBackend::Hash,
        embeddings_model_repo: None,
        embeddings_model_dir: None,
        embeddings_device: EmbeddingsDevice::Cpu,
        embedding_batch_size: 100,
        hash_embedding_dim: 16,
        chunk_size: 800,
        chunk_overlap: 150,
        download_timeout: Duration::from_secs(5),
        download_dir: std::env::temp_dir(),
        event_workers: 2,
        metrics_port: None,
    }
}

pub struct TestRig {
    pub pipeline: Arc<IngestPipeline>,
    pub index: Arc<MemoryIndex>,
    pub fetcher: Arc<CountingFetcher>,
    pub converter: Arc<ScriptedConverter>,
    pub metrics: Arc<MetricsRegistry>,
}

pub fn build_rig() -> TestRig {
    let index = Arc::new(MemoryIndex::new());
    let fetcher = Arc::new(CountingFetcher::new());
    let converter = Arc::new(ScriptedConverter::new("maintenance instructions"));
    let metrics = Arc::new(MetricsRegistry::new().unwrap());

    let pipeline = Arc::new(IngestPipeline::new(
        Arc::new(test_config()),
        Arc::clone(&index) as Arc<dyn DocumentIndex>,
        Box::new(HashEmbedder::new(16)),
        Arc::clone(&fetcher) as Arc<dyn AttachmentFetcher>,
        Arc::clone(&converter) as Arc<dyn TextConverter>,
        Arc::clone(&metrics),
    ));

    TestRig {
        pipeline,
        index,
        fetcher,
        converter,
        metrics,
    }
}

pub fn event(v: serde_json::Value) -> Event {
    serde_json::from_value(v).unwrap()
}

/// Poll `predicate` until it holds or the deadline passes.
pub async fn wait_until<F: Fn() -> bool>(predicate: F) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}
