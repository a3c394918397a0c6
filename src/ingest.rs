//! Attachment ingestion and deletion against the document index.

use crate::attachment::{resolve_attachment_url, source_name_from_url};
use crate::chunker::{clean_text, split_into_chunks};
use crate::config::Config;
use crate::embeddings::{embed_batched, Embedder};
use crate::extract::TextConverter;
use crate::fetch::AttachmentFetcher;
use crate::index::{ChunkRecord, DocumentIndex, RecordFilter, SearchHit};
use crate::metrics::MetricsRegistry;
use crate::model::Element;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Chunks were embedded and written to the index.
    Indexed { chunks: usize },
    /// Records for this (submodel, path) already exist; nothing was done.
    AlreadyIndexed,
    /// The attachment yielded no text after extraction and cleaning.
    EmptyDocument,
}

/// Everything one ingestion or deletion needs, wired once at startup and
/// shared across event workers.
pub struct IngestPipeline {
    config: Arc<Config>,
    index: Arc<dyn DocumentIndex>,
    embedder: Arc<tokio::sync::Mutex<Box<dyn Embedder + Send>>>,
    fetcher: Arc<dyn AttachmentFetcher>,
    converter: Arc<dyn TextConverter>,
    metrics: Arc<MetricsRegistry>,
}

impl IngestPipeline {
    pub fn new(
        config: Arc<Config>,
        index: Arc<dyn DocumentIndex>,
        embedder: Box<dyn Embedder + Send>,
        fetcher: Arc<dyn AttachmentFetcher>,
        converter: Arc<dyn TextConverter>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            config,
            index,
            embedder: Arc::new(tokio::sync::Mutex::new(embedder)),
            fetcher,
            converter,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Ingest one PDF file node at `location_path` inside `submodel_id`.
    ///
    /// Idempotent on (submodel_id, location_path): if the index already
    /// holds records under that key the download is skipped entirely.
    pub async fn ingest_attachment(
        &self,
        submodel_id: &str,
        location_path: &str,
        element: &Element,
    ) -> Result<IngestOutcome> {
        let timer = self.metrics.ingest_duration.start_timer();
        let result = self
            .ingest_attachment_inner(submodel_id, location_path, element)
            .await;
        timer.observe_duration();

        match &result {
            Ok(IngestOutcome::Indexed { chunks }) => {
                self.metrics.ingest_success_total.inc();
                self.metrics.chunks_indexed_total.inc_by(*chunks as f64);
            }
            Ok(IngestOutcome::AlreadyIndexed) => self.metrics.ingest_skipped_total.inc(),
            Ok(IngestOutcome::EmptyDocument) => {}
            Err(_) => self.metrics.ingest_errors_total.inc(),
        }
        result
    }

    async fn ingest_attachment_inner(
        &self,
        submodel_id: &str,
        location_path: &str,
        element: &Element,
    ) -> Result<IngestOutcome> {
        if self.index.has_document(submodel_id, location_path).await? {
            info!(submodel_id, location_path, "attachment already indexed, skipping");
            return Ok(IngestOutcome::AlreadyIndexed);
        }

        let local_name = element
            .id_short
            .as_deref()
            .ok_or_else(|| anyhow!("File node at '{location_path}' has no idShort"))?;

        let url = resolve_attachment_url(
            element.value_text(),
            submodel_id,
            local_name,
            &self.config.submodel_repo_url,
        );
        let source = source_name_from_url(&url);

        tokio::fs::create_dir_all(&self.config.download_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create download dir: {}",
                    self.config.download_dir.display()
                )
            })?;

        // Temp file is removed on drop, including every early return below.
        let download = tempfile::Builder::new()
            .prefix("attachment-")
            .suffix(".pdf")
            .tempfile_in(&self.config.download_dir)
            .context("Failed to create temp file for download")?;

        self.fetcher.fetch(&url, download.path()).await?;

        let text = self.converter.convert_to_text(download.path()).await?;
        let cleaned = clean_text(&text);
        let chunks = split_into_chunks(&cleaned, self.config.chunk_size, self.config.chunk_overlap);

        if chunks.is_empty() || chunks.iter().all(|c| c.trim().is_empty()) {
            warn!(submodel_id, location_path, "attachment contained no extractable text");
            return Ok(IngestOutcome::EmptyDocument);
        }

        let (vectors, dim) = {
            let mut embedder = self.embedder.lock().await;
            let vectors =
                embed_batched(embedder.as_mut(), &chunks, self.config.embedding_batch_size)?;
            (vectors, embedder.dim())
        };

        self.index.ensure_collection(dim).await?;

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(text, vector)| ChunkRecord {
                submodel_id: submodel_id.to_string(),
                id_short_path: location_path.to_string(),
                source: source.clone(),
                text,
                vector,
            })
            .collect();

        let count = records.len();
        self.index.insert_chunks(&records).await?;

        info!(submodel_id, location_path, chunks = count, "indexed attachment");
        Ok(IngestOutcome::Indexed { chunks: count })
    }

    /// Remove index records for `submodel_id`, optionally narrowed to one
    /// document path. Failures are logged and counted but never propagate:
    /// a broken index must not stall event processing.
    pub async fn delete_documents(&self, submodel_id: &str, id_short_path: Option<&str>) {
        let filter = match id_short_path {
            Some(path) => RecordFilter::document(submodel_id, path),
            None => RecordFilter::submodel(submodel_id),
        };

        if let Err(err) = self.index.delete_matching(&filter).await {
            self.metrics.delete_errors_swallowed_total.inc();
            warn!(
                submodel_id,
                id_short_path = id_short_path.unwrap_or("<all>"),
                error = %err,
                "index deletion failed, continuing"
            );
        } else {
            info!(
                submodel_id,
                id_short_path = id_short_path.unwrap_or("<all>"),
                "deleted index records"
            );
        }
    }

    /// Semantic search over indexed chunks, scoped to one submodel and
    /// optionally one document path.
    pub async fn search(
        &self,
        query: &str,
        submodel_id: &str,
        id_short_path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let timer = self.metrics.search_duration.start_timer();
        let result = self
            .search_inner(query, submodel_id, id_short_path, limit)
            .await;
        timer.observe_duration();

        if result.is_err() {
            self.metrics.search_errors_total.inc();
        }
        result
    }

    async fn search_inner(
        &self,
        query: &str,
        submodel_id: &str,
        id_short_path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let query_vector = {
            let mut embedder = self.embedder.lock().await;
            let mut vectors = embedder.embed(&[query.to_string()])?;
            vectors
                .pop()
                .ok_or_else(|| anyhow!("Embedder returned no vector for query"))?
        };

        let filter = match id_short_path {
            Some(path) => RecordFilter::document(submodel_id, path),
            None => RecordFilter::submodel(submodel_id),
        };

        self.index.search(&query_vector, &filter, limit).await
    }
}
