//! Storage abstraction traits
//!
//! Defines the document-store interface the image service talks to.
//! Implementations can be swapped between SQLite and the in-memory store.

use async_trait::async_trait;
use anyhow::Result;

/// Document written on create/update. All fields are replaced together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDocument {
    pub filename: String,
    pub content_type: String,
    /// Base64 text of the stored bytes
    pub encoded_payload: String,
}

/// A stored image record as read back from the store.
///
/// Data fields are optional: documents written by other tools may lack
/// them, and callers decide how to treat that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Store-assigned id
    pub id: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub encoded_payload: Option<String>,
}

impl ImageRecord {
    pub fn from_document(id: String, doc: ImageDocument) -> Self {
        Self {
            id,
            filename: Some(doc.filename),
            content_type: Some(doc.content_type),
            encoded_payload: Some(doc.encoded_payload),
        }
    }

    /// Length of the stored base64 text, 0 when absent
    pub fn size_b64(&self) -> usize {
        self.encoded_payload.as_deref().map_or(0, str::len)
    }
}

/// Image document store.
/// Each operation is atomic for a single document; nothing more is promised.
#[async_trait]
pub trait ImageStore: Send + Sync + 'static {
    /// Insert a new document and return its generated id
    async fn create(&self, doc: &ImageDocument) -> Result<String>;

    async fn get(&self, id: &str) -> Result<Option<ImageRecord>>;

    async fn list(&self) -> Result<Vec<ImageRecord>>;

    /// Replace all fields of an existing document.
    /// Returns false if no document has this id.
    async fn update(&self, id: &str, doc: &ImageDocument) -> Result<bool>;

    /// Returns false if no document has this id.
    async fn delete(&self, id: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_b64_of_missing_payload() {
        let record = ImageRecord {
            id: "x".to_string(),
            filename: Some("a.png".to_string()),
            content_type: None,
            encoded_payload: None,
        };
        assert_eq!(record.size_b64(), 0);
    }

    #[test]
    fn test_from_document_fills_every_field() {
        let doc = ImageDocument {
            filename: "a.png".to_string(),
            content_type: "image/png".to_string(),
            encoded_payload: "AAAA".to_string(),
        };
        let record = ImageRecord::from_document("id-1".to_string(), doc);

        assert_eq!(record.id, "id-1");
        assert_eq!(record.filename.as_deref(), Some("a.png"));
        assert_eq!(record.content_type.as_deref(), Some("image/png"));
        assert_eq!(record.size_b64(), 4);
    }
}
