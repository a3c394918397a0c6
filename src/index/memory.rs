use super::{ChunkRecord, DocumentIndex, RecordFilter, SearchHit};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// In-memory index with the same contract as the LanceDB implementation.
/// Used by the integration tests; also handy for local smoke runs.
#[derive(Default)]
pub struct MemoryIndex {
    // None until ensure_collection; mirrors the backing store's
    // created-on-first-ingest behavior.
    inner: Mutex<Option<Collection>>,
}

struct Collection {
    dim: usize,
    records: Vec<ChunkRecord>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all stored records, for assertions.
    pub fn snapshot(&self) -> Vec<ChunkRecord> {
        self.inner
            .lock()
            .ok()
            .and_then(|g| g.as_ref().map(|c| c.records.clone()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentIndex for MemoryIndex {
    async fn collection_exists(&self) -> Result<bool> {
        let guard = self.inner.lock().map_err(|_| anyhow!("index poisoned"))?;
        Ok(guard.is_some())
    }

    async fn ensure_collection(&self, dim: usize) -> Result<()> {
        let mut guard = self.inner.lock().map_err(|_| anyhow!("index poisoned"))?;
        if guard.is_none() {
            *guard = Some(Collection {
                dim,
                records: Vec::new(),
            });
        }
        Ok(())
    }

    async fn has_document(&self, submodel_id: &str, id_short_path: &str) -> Result<bool> {
        let filter = RecordFilter::document(submodel_id, id_short_path);
        let guard = self.inner.lock().map_err(|_| anyhow!("index poisoned"))?;
        Ok(guard
            .as_ref()
            .map(|c| c.records.iter().any(|r| filter.matches(r)))
            .unwrap_or(false))
    }

    async fn insert_chunks(&self, records: &[ChunkRecord]) -> Result<()> {
        let mut guard = self.inner.lock().map_err(|_| anyhow!("index poisoned"))?;
        let collection = guard
            .as_mut()
            .ok_or_else(|| anyhow!("Collection does not exist"))?;

        for record in records {
            if record.vector.len() != collection.dim {
                return Err(anyhow!(
                    "Vector dim mismatch for {}: expected {}, got {}",
                    record.id_short_path,
                    collection.dim,
                    record.vector.len()
                ));
            }
        }
        collection.records.extend_from_slice(records);
        Ok(())
    }

    async fn delete_matching(&self, filter: &RecordFilter) -> Result<()> {
        let mut guard = self.inner.lock().map_err(|_| anyhow!("index poisoned"))?;
        if let Some(collection) = guard.as_mut() {
            collection.records.retain(|r| !filter.matches(r));
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let guard = self.inner.lock().map_err(|_| anyhow!("index poisoned"))?;
        let collection = match guard.as_ref() {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };

        let mut scored: Vec<SearchHit> = collection
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| SearchHit {
                submodel_id: r.submodel_id.clone(),
                id_short_path: r.id_short_path.clone(),
                source: r.source.clone(),
                text: r.text.clone(),
                distance: Some(l2_distance(&r.vector, query_vector)),
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(submodel_id: &str, path: &str, vector: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            submodel_id: submodel_id.to_string(),
            id_short_path: path.to_string(),
            source: "doc.pdf".to_string(),
            text: "text".to_string(),
            vector,
        }
    }

    #[tokio::test]
    async fn mirrors_the_store_contract() {
        let index = MemoryIndex::new();

        assert!(!index.collection_exists().await.unwrap());
        assert!(index.insert_chunks(&[record("sm", "A", vec![0.0])]).await.is_err());

        index.ensure_collection(2).await.unwrap();
        index
            .insert_chunks(&[
                record("sm", "A", vec![1.0, 0.0]),
                record("sm", "B", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        assert!(index.has_document("sm", "A").await.unwrap());

        let hits = index
            .search(&[1.0, 0.0], &RecordFilter::submodel("sm"), 1)
            .await
            .unwrap();
        assert_eq!(hits[0].id_short_path, "A");

        index
            .delete_matching(&RecordFilter::document("sm", "A"))
            .await
            .unwrap();
        assert!(!index.has_document("sm", "A").await.unwrap());
        assert!(index.has_document("sm", "B").await.unwrap());
    }

    #[tokio::test]
    async fn dim_mismatch_is_rejected() {
        let index = MemoryIndex::new();
        index.ensure_collection(3).await.unwrap();
        let err = index
            .insert_chunks(&[record("sm", "A", vec![1.0])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dim mismatch"));
    }
}
