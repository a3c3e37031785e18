//! In-memory image store

use std::collections::HashMap;

use async_trait::async_trait;
use anyhow::Result;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::traits::{ImageDocument, ImageRecord, ImageStore};

/// HashMap-backed store; contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, ImageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a raw record in place, bypassing id generation.
    /// Used to simulate documents written by other tools.
    #[cfg(test)]
    pub async fn insert_raw(&self, record: ImageRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn create(&self, doc: &ImageDocument) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let record = ImageRecord::from_document(id.clone(), doc.clone());
        self.records.write().await.insert(id.clone(), record);

        debug!("Created image document: {}", id);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<ImageRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<ImageRecord>> {
        let mut records: Vec<ImageRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn update(&self, id: &str, doc: &ImageDocument) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(id) {
            Some(existing) => {
                *existing = ImageRecord::from_document(id.to_string(), doc.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> ImageDocument {
        ImageDocument {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            encoded_payload: "AAAA".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryStore::new();

        let id = store.create(&doc("a.png")).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(store.len().await, 1);

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.filename.as_deref(), Some("a.png"));

        assert!(store.update(&id, &doc("b.png")).await.unwrap());
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.filename.as_deref(), Some("b.png"));

        assert!(!store.update("missing", &doc("c.png")).await.unwrap());
        assert!(store.get("missing").await.unwrap().is_none());

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(store.is_empty().await);
    }
}
