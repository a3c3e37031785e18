//! SQLite storage implementation

use std::path::Path;

use async_trait::async_trait;
use sqlx::{sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow}, Row};
use anyhow::{Result, Context, bail};
use tracing::{info, debug};
use uuid::Uuid;

use crate::config::is_valid_collection;

use super::traits::{ImageStore, ImageDocument, ImageRecord};

/// SQLite-based image storage, one table per collection
pub struct SqliteStorage {
    pool: SqlitePool,
    collection: String,
}

impl SqliteStorage {
    /// Create a new SQLite storage
    pub async fn new(db_path: &str, collection: &str) -> Result<Self> {
        if !is_valid_collection(collection) {
            bail!("Invalid collection name: {:?}", collection);
        }

        // Ensure parent directory exists
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Create connection pool
        let database_url = format!("sqlite:{}?mode=rwc", db_path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let storage = Self {
            pool,
            collection: collection.to_string(),
        };
        storage.initialize().await?;

        Ok(storage)
    }

    /// Initialize database schema
    async fn initialize(&self) -> Result<()> {
        // Data columns are nullable: rows missing them are reported as
        // incomplete rather than rejected here
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                filename TEXT,
                content_type TEXT,
                b64 TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            self.collection
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_created_at ON {0}(created_at)",
            self.collection
        ))
        .execute(&self.pool)
        .await?;

        info!("SQLite collection '{}' initialized", self.collection);
        Ok(())
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn record_from_row(row: &SqliteRow) -> ImageRecord {
    ImageRecord {
        id: row.get("id"),
        filename: row.get("filename"),
        content_type: row.get("content_type"),
        encoded_payload: row.get("b64"),
    }
}

#[async_trait]
impl ImageStore for SqliteStorage {
    async fn create(&self, doc: &ImageDocument) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = now_secs();

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, filename, content_type, b64, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            self.collection
        ))
        .bind(&id)
        .bind(&doc.filename)
        .bind(&doc.content_type)
        .bind(&doc.encoded_payload)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!("Saved image: {}", id);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<ImageRecord>> {
        let row = sqlx::query(&format!(
            "SELECT id, filename, content_type, b64 FROM {} WHERE id = ?",
            self.collection
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn list(&self) -> Result<Vec<ImageRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT id, filename, content_type, b64
            FROM {}
            ORDER BY created_at ASC, id ASC
            "#,
            self.collection
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn update(&self, id: &str, doc: &ImageDocument) -> Result<bool> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET filename = ?, content_type = ?, b64 = ?, updated_at = ?
            WHERE id = ?
            "#,
            self.collection
        ))
        .bind(&doc.filename)
        .bind(&doc.content_type)
        .bind(&doc.encoded_payload)
        .bind(now_secs())
        .bind(id)
        .execute(&self.pool)
        .await?;

        debug!("Updated image: {}", id);
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.collection))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn doc(name: &str, payload: &str) -> ImageDocument {
        ImageDocument {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            encoded_payload: payload.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sqlite_storage() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(db_path.to_str().unwrap(), "images").await.unwrap();

        // Create
        let id = storage.create(&doc("cat.png", "aGVsbG8=")).await.unwrap();

        // Get
        let retrieved = storage.get(&id).await.unwrap();
        assert!(retrieved.is_some());
        let retrieved = retrieved.unwrap();
        assert_eq!(retrieved.filename.as_deref(), Some("cat.png"));
        assert_eq!(retrieved.size_b64(), 8);

        // Update replaces every field
        let replacement = ImageDocument {
            filename: "cat.webp".to_string(),
            content_type: "image/webp".to_string(),
            encoded_payload: "UklGRg==".to_string(),
        };
        assert!(storage.update(&id, &replacement).await.unwrap());
        let retrieved = storage.get(&id).await.unwrap().unwrap();
        assert_eq!(retrieved, ImageRecord::from_document(id.clone(), replacement));

        // List
        storage.create(&doc("dog.png", "AAAA")).await.unwrap();
        let all = storage.list().await.unwrap();
        assert_eq!(all.len(), 2);

        // Delete
        let deleted = storage.delete(&id).await.unwrap();
        assert!(deleted);

        // Verify deleted
        assert!(storage.get(&id).await.unwrap().is_none());
        assert!(!storage.delete(&id).await.unwrap());
        assert!(!storage.update(&id, &doc("x.png", "")).await.unwrap());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let path = db_path.to_str().unwrap();

        let images = SqliteStorage::new(path, "images").await.unwrap();
        let thumbs = SqliteStorage::new(path, "thumbs").await.unwrap();

        let id = images.create(&doc("a.png", "AAAA")).await.unwrap();
        assert!(thumbs.get(&id).await.unwrap().is_none());
        assert!(thumbs.list().await.unwrap().is_empty());
        assert_eq!(thumbs.collection(), "thumbs");
    }

    #[tokio::test]
    async fn test_rejects_unsafe_collection_name() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let result = SqliteStorage::new(db_path.to_str().unwrap(), "images; DROP TABLE x").await;
        assert!(result.is_err());
    }
}
