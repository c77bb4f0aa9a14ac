//! PostgreSQL + pgvector index
//!
//! Vectors are stored in an untyped `vector` column and queried with raw SQL
//! through SeaORM, one row per chunk keyed by `(collection, id)`.

use super::{DistanceMetric, IndexHit, IndexRecord, VectorIndex};
use crate::errors::{AppError, Result};
use crate::models::ChunkMetadata;
use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement,
    TransactionTrait,
};
use std::time::Duration;
use tracing::info;

const SCHEMA: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS vector",
    r#"
    CREATE TABLE IF NOT EXISTS protolens_collections (
        name TEXT PRIMARY KEY,
        metric TEXT NOT NULL,
        dimension INTEGER NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS protolens_chunks (
        collection TEXT NOT NULL REFERENCES protolens_collections(name) ON DELETE CASCADE,
        id TEXT NOT NULL,
        embedding vector NOT NULL,
        text TEXT NOT NULL,
        page_number INTEGER NOT NULL,
        start_pos BIGINT NOT NULL,
        end_pos BIGINT NOT NULL,
        source_label TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    )
    "#,
];

/// pgvector-backed collection
pub struct PgVectorIndex {
    db: DatabaseConnection,
    collection: String,
    metric: DistanceMetric,
    dimension: usize,
}

/// Convert `Vec<f32>` to pgvector text format "[1.0,2.0,...]"
fn to_pgvector(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

impl PgVectorIndex {
    /// Connect, create the schema and register or verify the collection
    pub async fn connect(
        url: &str,
        collection: &str,
        metric: DistanceMetric,
        dimension: usize,
    ) -> Result<Self> {
        info!(collection = collection, "Connecting to pgvector database...");

        let mut opts = ConnectOptions::new(url);
        opts.max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let db = Database::connect(opts).await?;

        for statement in SCHEMA {
            db.execute_unprepared(statement).await?;
        }

        let index = Self {
            db,
            collection: collection.to_string(),
            metric,
            dimension,
        };
        index.register().await?;

        info!(collection = collection, metric = metric.as_str(), "pgvector collection ready");
        Ok(index)
    }

    /// Record the metric on first use; refuse to reopen with a different one
    async fn register(&self) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO protolens_collections (name, metric, dimension)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
            vec![
                self.collection.clone().into(),
                self.metric.as_str().into(),
                (self.dimension as i32).into(),
            ],
        );
        self.db.execute(stmt).await?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT metric, dimension FROM protolens_collections WHERE name = $1",
            vec![self.collection.clone().into()],
        );
        let row = self
            .db
            .query_one(stmt)
            .await?
            .ok_or_else(|| AppError::VectorIndex {
                message: format!("collection {} was not registered", self.collection),
            })?;

        let stored_metric = DistanceMetric::parse(&row.try_get_by_index::<String>(0)?)?;
        let stored_dimension = row.try_get_by_index::<i32>(1)? as usize;

        if stored_metric != self.metric {
            return Err(AppError::Configuration {
                message: format!(
                    "collection {} was created with metric {}, not {}",
                    self.collection,
                    stored_metric.as_str(),
                    self.metric.as_str()
                ),
            });
        }
        if stored_dimension != self.dimension {
            return Err(AppError::Configuration {
                message: format!(
                    "collection {} was created with dimension {}, not {}",
                    self.collection, stored_dimension, self.dimension
                ),
            });
        }

        Ok(())
    }

    fn check_dimensions(&self, records: &[IndexRecord]) -> Result<()> {
        match records.iter().find(|r| r.embedding.len() != self.dimension) {
            Some(record) => Err(AppError::VectorIndex {
                message: format!(
                    "embedding dimension {} does not match collection dimension {}",
                    record.embedding.len(),
                    self.dimension
                ),
            }),
            None => Ok(()),
        }
    }

    async fn insert<C: ConnectionTrait>(&self, conn: &C, record: IndexRecord) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO protolens_chunks (
                collection, id, embedding, text, page_number,
                start_pos, end_pos, source_label
            )
            VALUES ($1, $2, $3::vector, $4, $5, $6, $7, $8)
            ON CONFLICT (collection, id) DO UPDATE SET
                embedding = EXCLUDED.embedding,
                text = EXCLUDED.text,
                page_number = EXCLUDED.page_number,
                start_pos = EXCLUDED.start_pos,
                end_pos = EXCLUDED.end_pos,
                source_label = EXCLUDED.source_label
            "#,
            vec![
                self.collection.clone().into(),
                record.id.into(),
                to_pgvector(&record.embedding).into(),
                record.metadata.text.into(),
                (record.metadata.page_number as i32).into(),
                (record.metadata.start_pos as i64).into(),
                (record.metadata.end_pos as i64).into(),
                record.metadata.source_label.into(),
            ],
        );
        conn.execute(stmt).await?;
        Ok(())
    }

    fn operator(&self) -> &'static str {
        match self.metric {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::L2 => "<->",
        }
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        self.check_dimensions(&records)?;

        let txn = self.db.begin().await?;
        for record in records {
            self.insert(&txn, record).await?;
        }
        txn.commit().await?;
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if embedding.len() != self.dimension {
            return Err(AppError::VectorIndex {
                message: format!(
                    "query dimension {} does not match collection dimension {}",
                    embedding.len(),
                    self.dimension
                ),
            });
        }

        let sql = format!(
            r#"
            SELECT id, text, page_number, start_pos, end_pos, source_label,
                   (embedding {op} $1::vector)::real AS distance
            FROM protolens_chunks
            WHERE collection = $2
            ORDER BY embedding {op} $1::vector, id
            LIMIT $3
            "#,
            op = self.operator()
        );

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            vec![
                to_pgvector(embedding).into(),
                self.collection.clone().into(),
                (k as i64).into(),
            ],
        );

        let rows = self.db.query_all(stmt).await?;
        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            hits.push(IndexHit {
                id: row.try_get_by_index::<String>(0)?,
                metadata: ChunkMetadata {
                    text: row.try_get_by_index::<String>(1)?,
                    page_number: row.try_get_by_index::<i32>(2)? as u32,
                    start_pos: row.try_get_by_index::<i64>(3)? as usize,
                    end_pos: row.try_get_by_index::<i64>(4)? as usize,
                    source_label: row.try_get_by_index::<String>(5)?,
                },
                distance: row.try_get_by_index::<f32>(6)?.max(0.0),
            });
        }

        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT COUNT(*) FROM protolens_chunks WHERE collection = $1",
            vec![self.collection.clone().into()],
        );
        let count = match self.db.query_one(stmt).await? {
            Some(row) => row.try_get_by_index::<i64>(0)?,
            None => 0,
        };
        Ok(count as usize)
    }

    async fn replace(&self, records: Vec<IndexRecord>) -> Result<()> {
        self.check_dimensions(&records)?;

        // Dropping the transaction on error rolls back the delete
        let txn = self.db.begin().await?;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "DELETE FROM protolens_chunks WHERE collection = $1",
            vec![self.collection.clone().into()],
        );
        txn.execute(stmt).await?;
        for record in records {
            self.insert(&txn, record).await?;
        }
        txn.commit().await?;
        Ok(())
    }
}
