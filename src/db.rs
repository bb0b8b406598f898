//! SQLite pool creation and schema bootstrap
//!
//! Documents and vector records are the only persisted state. The schema is
//! created on startup; `app_meta.schema_version` guards against running old
//! code against a newer store.

use crate::error::CoreError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Highest persisted-schema version this build understands.
pub const SUPPORTED_SCHEMA_VERSION: i64 = 1;

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, anyhow::Error> {
    if let Some(path) = database_url
        .strip_prefix("sqlite://")
        .filter(|p| *p != ":memory:")
    {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create tables and verify the stored schema version.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS app_meta (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let found: Option<(i64,)> =
        sqlx::query_as("SELECT value FROM app_meta WHERE key = 'schema_version'")
            .fetch_optional(pool)
            .await?;

    match found {
        Some((version,)) if version > SUPPORTED_SCHEMA_VERSION => {
            return Err(CoreError::IncompatibleState {
                found: version,
                supported: SUPPORTED_SCHEMA_VERSION,
            });
        }
        Some(_) => {}
        None => {
            sqlx::query("INSERT INTO app_meta (key, value) VALUES ('schema_version', ?)")
                .bind(SUPPORTED_SCHEMA_VERSION)
                .execute(pool)
                .await?;
        }
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            kind TEXT NOT NULL,
            keywords_json TEXT NOT NULL,
            usefulness REAL NOT NULL,
            views INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vector_records (
            doc_id TEXT PRIMARY KEY,
            record_kind TEXT NOT NULL,
            vector_json TEXT NOT NULL,
            kind TEXT NOT NULL,
            keywords_json TEXT NOT NULL,
            usefulness REAL NOT NULL,
            embedder_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory pool")
    }

    #[tokio::test]
    async fn init_schema_is_idempotent() {
        let pool = memory_pool().await;
        init_schema(&pool).await.expect("first init");
        init_schema(&pool).await.expect("second init");
    }

    #[tokio::test]
    async fn newer_schema_version_is_rejected() {
        let pool = memory_pool().await;
        init_schema(&pool).await.expect("init");

        sqlx::query("UPDATE app_meta SET value = ? WHERE key = 'schema_version'")
            .bind(SUPPORTED_SCHEMA_VERSION + 1)
            .execute(&pool)
            .await
            .unwrap();

        let err = init_schema(&pool).await.expect_err("must reject");
        assert_eq!(err.kind(), "INCOMPATIBLE_STATE");
    }
}
