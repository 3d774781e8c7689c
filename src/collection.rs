use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::engine::local::{ Db, RocksDb };
use surrealdb::Surreal;

use crate::error::RagError;
use crate::models::{ DocumentRecord, QueryResults };

const TABLE: &str = "documents";

#[async_trait]
pub trait VectorCollection: Send + Sync {
    /// Returns the `n_results` nearest records for each query embedding, best first.
    async fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize
    ) -> Result<QueryResults, RagError>;

    /// Inserts records, replacing any stored record with the same `record_key`.
    async fn add(&self, records: Vec<DocumentRecord>) -> Result<(), RagError>;

    async fn count(&self) -> Result<usize, RagError>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| x * y)
        .sum();
    let magnitude_a: f32 = a
        .iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();
    let magnitude_b: f32 = b
        .iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

pub struct SurrealCollection {
    db: Surreal<Db>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: i64,
}

impl SurrealCollection {
    pub async fn open(db_path: &str) -> Result<Self, RagError> {
        let db = Surreal::new::<RocksDb>(db_path).await?;
        db.use_ns("rag").use_db("multimodal").await?;
        db.query(
            "
            DEFINE TABLE documents SCHEMALESS;
            DEFINE INDEX idx_document ON documents FIELDS document;
        "
        ).await?;

        tracing::info!("Opened collection at {}", db_path);
        Ok(Self { db })
    }

    async fn all_records(&self) -> Result<Vec<DocumentRecord>, RagError> {
        let records: Vec<DocumentRecord> = self.db
            .query("SELECT document, metadata, embedding FROM documents")
            .await?
            .take(0)?;
        Ok(records)
    }
}

#[async_trait]
impl VectorCollection for SurrealCollection {
    async fn query(
        &self,
        query_embeddings: &[Vec<f32>],
        n_results: usize
    ) -> Result<QueryResults, RagError> {
        let records = self.all_records().await?;
        tracing::debug!("Scanning {} records for {} queries", records.len(), query_embeddings.len());

        let mut results = QueryResults::default();
        for query_embedding in query_embeddings {
            let mut scored: Vec<(f32, &DocumentRecord)> = records
                .iter()
                .map(|record| (cosine_similarity(&record.embedding, query_embedding), record))
                .collect();

            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(n_results);

            results.documents.push(
                scored
                    .iter()
                    .map(|(_, r)| r.document.clone())
                    .collect()
            );
            results.metadatas.push(
                scored
                    .iter()
                    .map(|(_, r)| r.metadata.clone())
                    .collect()
            );
        }

        Ok(results)
    }

    async fn add(&self, records: Vec<DocumentRecord>) -> Result<(), RagError> {
        for record in records {
            let key = record.record_key();
            let _stored: Option<DocumentRecord> = self.db
                .update((TABLE, key))
                .content(record).await?;
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize, RagError> {
        let row: Option<CountRow> = self.db
            .query("SELECT count() AS count FROM documents GROUP ALL")
            .await?
            .take(0)?;
        Ok(row.map_or(0, |r| r.count.max(0) as usize))
    }
}
