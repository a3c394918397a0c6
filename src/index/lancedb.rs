use super::{ChunkRecord, DocumentIndex, RecordFilter, SearchHit};
use anyhow::{anyhow, Context, Result};
use arrow_array::{
    types::Float32Type, Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    query::{ExecutableQuery, QueryBase},
    Connection, Table,
};
use std::{path::Path, sync::Arc};

pub struct LanceDbIndex {
    db: Connection,
    table_name: String,
}

impl LanceDbIndex {
    pub async fn connect(path: &Path, table_name: &str) -> Result<Self> {
        let uri = path
            .to_str()
            .ok_or_else(|| anyhow!("VECTOR_DB_PATH is not valid UTF-8"))?;

        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create VECTOR_DB_PATH: {}", path.display()))?;

        let db = lancedb::connect(uri)
            .execute()
            .await
            .context("Failed to connect to lancedb")?;

        Ok(Self {
            db,
            table_name: table_name.to_string(),
        })
    }

    async fn open_table_if_exists(&self) -> Result<Option<Table>> {
        let existing = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list lancedb table names")?;

        if !existing.iter().any(|n| n == &self.table_name) {
            return Ok(None);
        }

        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("Failed to open lancedb table")?;
        Ok(Some(table))
    }
}

#[async_trait]
impl DocumentIndex for LanceDbIndex {
    async fn collection_exists(&self) -> Result<bool> {
        Ok(self.open_table_if_exists().await?.is_some())
    }

    async fn ensure_collection(&self, dim: usize) -> Result<()> {
        if self.open_table_if_exists().await?.is_some() {
            return Ok(());
        }

        let schema = Arc::new(build_schema(dim));
        self.db
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .context("Failed to create lancedb table")?;
        Ok(())
    }

    async fn has_document(&self, submodel_id: &str, id_short_path: &str) -> Result<bool> {
        let table = match self.open_table_if_exists().await? {
            Some(t) => t,
            None => return Ok(false),
        };

        let predicate = filter_predicate(&RecordFilter::document(submodel_id, id_short_path));
        let stream = table
            .query()
            .only_if(predicate)
            .limit(1)
            .execute()
            .await
            .context("Failed to execute lancedb existence query")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;
        Ok(batches.iter().any(|b| b.num_rows() > 0))
    }

    async fn insert_chunks(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let table = self
            .open_table_if_exists()
            .await?
            .ok_or_else(|| anyhow!("Collection {} does not exist", self.table_name))?;

        let dim = records[0].vector.len();
        for record in records {
            if record.vector.len() != dim {
                return Err(anyhow!(
                    "Vector dim mismatch for {}: expected {}, got {}",
                    record.id_short_path,
                    dim,
                    record.vector.len()
                ));
            }
        }

        let schema = Arc::new(build_schema(dim));
        let batch = build_record_batch(schema.clone(), records, dim)?;
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema.clone());

        table
            .add(Box::new(batches))
            .execute()
            .await
            .context("Failed to add records to lancedb table")?;
        Ok(())
    }

    async fn delete_matching(&self, filter: &RecordFilter) -> Result<()> {
        let table = match self.open_table_if_exists().await? {
            Some(t) => t,
            None => return Ok(()),
        };

        let predicate = filter_predicate(filter);
        table
            .delete(&predicate)
            .await
            .context("Failed to delete lancedb records")?;
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let table = match self.open_table_if_exists().await? {
            Some(t) => t,
            None => return Ok(Vec::new()),
        };

        let stream = table
            .query()
            .nearest_to(query_vector)
            .context("Failed to create lancedb nearest_to query")?
            .only_if(filter_predicate(filter))
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute lancedb search")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut out = Vec::new();
        for batch in batches {
            let submodel_id = string_column(&batch, "submodel_id")?;
            let id_short_path = string_column(&batch, "id_short_path")?;
            let source = string_column(&batch, "source")?;
            let text = string_column(&batch, "text")?;
            let distance = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

            for row in 0..batch.num_rows() {
                if submodel_id.is_null(row) {
                    continue;
                }
                out.push(SearchHit {
                    submodel_id: submodel_id.value(row).to_string(),
                    id_short_path: if id_short_path.is_null(row) {
                        "".to_string()
                    } else {
                        id_short_path.value(row).to_string()
                    },
                    source: if source.is_null(row) {
                        "".to_string()
                    } else {
                        source.value(row).to_string()
                    },
                    text: if text.is_null(row) {
                        "".to_string()
                    } else {
                        text.value(row).to_string()
                    },
                    distance: distance.and_then(|d| {
                        if d.is_null(row) {
                            None
                        } else {
                            Some(d.value(row))
                        }
                    }),
                });
            }
        }

        Ok(out)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("Missing {name} column in lancedb result"))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("{name} column is not StringArray"))
}

fn escape_lancedb_string(s: &str) -> String {
    s.replace('\'', "''")
}

fn filter_predicate(filter: &RecordFilter) -> String {
    let submodel = escape_lancedb_string(&filter.submodel_id);
    match &filter.id_short_path {
        Some(path) => {
            let path = escape_lancedb_string(path);
            format!("submodel_id = '{submodel}' AND id_short_path = '{path}'")
        }
        None => format!("submodel_id = '{submodel}'"),
    }
}

fn build_schema(vector_dim: usize) -> Schema {
    Schema::new(vec![
        Field::new("submodel_id", DataType::Utf8, true),
        Field::new("id_short_path", DataType::Utf8, true),
        Field::new("source", DataType::Utf8, true),
        Field::new("text", DataType::Utf8, true),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                vector_dim as i32,
            ),
            true,
        ),
    ])
}

fn build_record_batch(
    schema: Arc<Schema>,
    records: &[ChunkRecord],
    vector_dim: usize,
) -> Result<RecordBatch> {
    let submodel_ids = StringArray::from(
        records
            .iter()
            .map(|r| r.submodel_id.as_str())
            .collect::<Vec<_>>(),
    );
    let id_short_paths = StringArray::from(
        records
            .iter()
            .map(|r| r.id_short_path.as_str())
            .collect::<Vec<_>>(),
    );
    let sources = StringArray::from(records.iter().map(|r| r.source.as_str()).collect::<Vec<_>>());
    let texts = StringArray::from(records.iter().map(|r| r.text.as_str()).collect::<Vec<_>>());

    let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        records
            .iter()
            .map(|r| Some(r.vector.iter().copied().map(Some))),
        vector_dim as i32,
    );

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(submodel_ids),
            Arc::new(id_short_paths),
            Arc::new(sources),
            Arc::new(texts),
            Arc::new(vectors),
        ],
    )
    .context("Failed to build arrow record batch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_db_dir() -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("aas-embedding-lancedb-{nanos}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn record(submodel_id: &str, path: &str, vector: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            submodel_id: submodel_id.to_string(),
            id_short_path: path.to_string(),
            source: "manual.pdf".to_string(),
            text: format!("chunk of {path}"),
            vector,
        }
    }

    #[tokio::test]
    async fn creates_collection_inserts_and_searches() {
        let dir = tmp_db_dir();
        let index = LanceDbIndex::connect(&dir, "docs").await.unwrap();

        assert!(!index.collection_exists().await.unwrap());
        index.ensure_collection(3).await.unwrap();
        assert!(index.collection_exists().await.unwrap());

        index
            .insert_chunks(&[
                record("sm1", "Docs.Manual", vec![1.0, 0.0, 0.0]),
                record("sm1", "Docs.Sheet", vec![0.0, 1.0, 0.0]),
                record("sm2", "Docs.Manual", vec![0.9, 0.1, 0.0]),
            ])
            .await
            .unwrap();

        assert!(index.has_document("sm1", "Docs.Manual").await.unwrap());
        assert!(!index.has_document("sm1", "Other").await.unwrap());

        let hits = index
            .search(&[1.0, 0.0, 0.0], &RecordFilter::submodel("sm1"), 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.submodel_id == "sm1"));
        assert_eq!(hits[0].id_short_path, "Docs.Manual");
    }

    #[tokio::test]
    async fn delete_scopes_to_the_filter() {
        let dir = tmp_db_dir();
        let index = LanceDbIndex::connect(&dir, "docs").await.unwrap();
        index.ensure_collection(3).await.unwrap();

        index
            .insert_chunks(&[
                record("sm1", "A.B", vec![1.0, 0.0, 0.0]),
                record("sm1", "A.C", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        index
            .delete_matching(&RecordFilter::document("sm1", "A.B"))
            .await
            .unwrap();

        assert!(!index.has_document("sm1", "A.B").await.unwrap());
        assert!(index.has_document("sm1", "A.C").await.unwrap());

        index
            .delete_matching(&RecordFilter::submodel("sm1"))
            .await
            .unwrap();
        assert!(!index.has_document("sm1", "A.C").await.unwrap());
    }

    #[tokio::test]
    async fn missing_collection_is_not_an_error_for_reads_and_deletes() {
        let dir = tmp_db_dir();
        let index = LanceDbIndex::connect(&dir, "docs").await.unwrap();

        assert!(!index.has_document("sm1", "A").await.unwrap());
        index
            .delete_matching(&RecordFilter::submodel("sm1"))
            .await
            .unwrap();
        let hits = index
            .search(&[0.0; 3], &RecordFilter::submodel("sm1"), 3)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
