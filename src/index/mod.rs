//! Document index abstraction.
//!
//! The ingestion and deletion paths talk to the index through the
//! [`DocumentIndex`] trait; the LanceDB implementation backs production and
//! an in-memory implementation backs the tests.

pub mod lancedb;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

/// One embedded chunk of an attachment, addressed by the submodel it lives
/// in and the dotted/indexed path of the file node inside that submodel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub submodel_id: String,
    pub id_short_path: String,
    pub source: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Scope for deletions and existence checks. A `None` path means "every
/// record of the submodel".
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFilter {
    pub submodel_id: String,
    pub id_short_path: Option<String>,
}

impl RecordFilter {
    pub fn submodel(submodel_id: impl Into<String>) -> Self {
        Self {
            submodel_id: submodel_id.into(),
            id_short_path: None,
        }
    }

    pub fn document(submodel_id: impl Into<String>, id_short_path: impl Into<String>) -> Self {
        Self {
            submodel_id: submodel_id.into(),
            id_short_path: Some(id_short_path.into()),
        }
    }

    fn matches(&self, record: &ChunkRecord) -> bool {
        record.submodel_id == self.submodel_id
            && self
                .id_short_path
                .as_ref()
                .map(|p| &record.id_short_path == p)
                .unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub submodel_id: String,
    pub id_short_path: String,
    pub source: String,
    pub text: String,
    pub distance: Option<f32>,
}

#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Whether the backing collection has been created yet.
    async fn collection_exists(&self) -> Result<bool>;

    /// Create the collection if absent. The vector dimension is fixed at
    /// creation time and must match every subsequent insert.
    async fn ensure_collection(&self, dim: usize) -> Result<()>;

    /// True when at least one chunk is indexed for the given document.
    async fn has_document(&self, submodel_id: &str, id_short_path: &str) -> Result<bool>;

    async fn insert_chunks(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Remove every record matching `filter`. Absent collections and empty
    /// matches are not errors.
    async fn delete_matching(&self, filter: &RecordFilter) -> Result<()>;

    async fn search(
        &self,
        query_vector: &[f32],
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;
}
