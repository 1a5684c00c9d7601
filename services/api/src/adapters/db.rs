//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` port from the `core` crate. Every collection lives in
//! one PostgreSQL table, `documents`, with the fields of each document held in a
//! JSONB column.

use async_trait::async_trait;
use od_ledger_core::ports::{DocumentStore, Fields, PortError, PortResult};
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    key: String,
    fields: Json<Value>,
}

impl DocumentRecord {
    fn into_domain(self) -> (String, Fields) {
        let fields = match self.fields.0 {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        (self.key, fields)
    }
}

fn map_sqlx_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Unavailable(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> PortResult<Option<Fields>> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT key, fields FROM documents WHERE collection = $1 AND key = $2",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(record.map(|r| r.into_domain().1))
    }

    async fn set(&self, collection: &str, key: &str, fields: Fields) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO documents (collection, key, fields) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, key) DO UPDATE SET fields = EXCLUDED.fields, updated_at = now()",
        )
        .bind(collection)
        .bind(key)
        .bind(Json(Value::Object(fields)))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update(&self, collection: &str, key: &str, fields: Fields) -> PortResult<()> {
        // `||` on two JSONB objects is a shallow merge, right side winning.
        let result = sqlx::query(
            "UPDATE documents SET fields = fields || $3, updated_at = now() \
             WHERE collection = $1 AND key = $2",
        )
        .bind(collection)
        .bind(key)
        .bind(Json(Value::Object(fields)))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("{}/{}", collection, key)));
        }
        Ok(())
    }

    async fn scan_all(&self, collection: &str) -> PortResult<Vec<(String, Fields)>> {
        let records = sqlx::query_as::<_, DocumentRecord>(
            "SELECT key, fields FROM documents WHERE collection = $1 ORDER BY key ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let documents = records.into_iter().map(|r| r.into_domain()).collect();
        Ok(documents)
    }
}
