//! Image Service - Core business logic
//!
//! Orchestrates the encoding gate and the document store.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::{info, warn};

use crate::config::Config;
use crate::encoding::{decode_b64, EncodingGate, PrepareError, PreparedPayload};
use crate::storage::{ImageDocument, ImageStore};

use super::error::{ServiceError, ServiceResult};
use super::types::*;

/// Image record service
pub struct ImageService<S: ImageStore> {
    gate: EncodingGate,
    storage: Arc<S>,
}

impl<S: ImageStore> ImageService<S> {
    /// Create a new image service
    pub fn new(storage: Arc<S>, gate: EncodingGate) -> Self {
        Self { gate, storage }
    }

    pub fn from_config(storage: Arc<S>, config: &Config) -> Self {
        let gate = EncodingGate::new(config.limits.max_b64_bytes, config.limits.webp_quality);
        Self::new(storage, gate)
    }

    /// Get a reference to the storage
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn gate(&self) -> &EncodingGate {
        &self.gate
    }

    /// Store a new image
    pub async fn create(&self, upload: Upload) -> ServiceResult<UploadResult> {
        let prepared = self.prepare(upload).await?;
        let doc = to_document(&prepared);

        let id = self.storage.create(&doc).await?;

        info!(
            "Stored image {} ({}, {} b64 bytes, transcoded: {})",
            id,
            prepared.filename,
            prepared.size_b64(),
            prepared.transcoded
        );

        Ok(UploadResult {
            id,
            filename: prepared.filename.clone(),
            size_b64: prepared.size_b64(),
        })
    }

    /// Metadata for every stored image
    pub async fn list(&self) -> ServiceResult<Vec<ImageSummary>> {
        let records = self.storage.list().await?;

        Ok(records
            .into_iter()
            .map(|r| ImageSummary {
                size_b64: r.size_b64(),
                id: r.id,
                filename: r.filename,
                content_type: r.content_type,
            })
            .collect())
    }

    /// Fetch and decode an image
    pub async fn get(&self, id: &str) -> ServiceResult<ImageContent> {
        let record = self.storage.get(id).await?.ok_or(ServiceError::NotFound)?;

        let (Some(filename), Some(content_type), Some(payload)) =
            (record.filename, record.content_type, record.encoded_payload)
        else {
            return Err(ServiceError::IncompleteData);
        };

        // The gate accepts empty uploads, so an empty payload is how a
        // zero-length image is stored and must round-trip. Filename and
        // content type are never empty on write, so empty ones mean the
        // document was not written by this service.
        if filename.is_empty() || content_type.is_empty() {
            return Err(ServiceError::IncompleteData);
        }

        let bytes = decode_b64(&payload)
            .with_context(|| format!("stored payload of image {} is not valid base64", id))?;

        Ok(ImageContent {
            filename,
            content_type,
            bytes,
        })
    }

    /// NotFound unless a record with this id exists
    pub async fn ensure_exists(&self, id: &str) -> ServiceResult<()> {
        match self.storage.get(id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound),
        }
    }

    /// Replace an existing image
    pub async fn update(&self, id: &str, upload: Upload) -> ServiceResult<UploadResult> {
        self.ensure_exists(id).await?;

        let prepared = self.prepare(upload).await?;
        let doc = to_document(&prepared);

        // Deleted between the check and the write
        if !self.storage.update(id, &doc).await? {
            return Err(ServiceError::NotFound);
        }

        info!(
            "Replaced image {} ({}, {} b64 bytes, transcoded: {})",
            id,
            prepared.filename,
            prepared.size_b64(),
            prepared.transcoded
        );

        Ok(UploadResult {
            id: id.to_string(),
            filename: prepared.filename.clone(),
            size_b64: prepared.size_b64(),
        })
    }

    /// Delete an image
    pub async fn delete(&self, id: &str) -> ServiceResult<DeleteResult> {
        if !self.storage.delete(id).await? {
            return Err(ServiceError::NotFound);
        }

        info!("Deleted image {}", id);
        Ok(DeleteResult {
            id: id.to_string(),
            deleted: true,
        })
    }

    /// Get health status
    pub fn health(&self) -> HealthResult {
        HealthResult {
            healthy: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Run the encoding gate on the blocking pool; transcoding is CPU-bound
    async fn prepare(&self, upload: Upload) -> ServiceResult<PreparedPayload> {
        let gate = self.gate.clone();
        let filename = upload.filename.clone();

        let result = tokio::task::spawn_blocking(move || {
            gate.prepare(
                &upload.bytes,
                &upload.content_type,
                &upload.filename,
                upload.convert_webp,
            )
        })
        .await
        .context("encoding task failed")?;

        match result {
            Ok(prepared) => Ok(prepared),
            Err(PrepareError::Rejected(rejection)) => {
                warn!("Rejected upload {}: {}", filename, rejection);
                Err(ServiceError::Rejected(rejection))
            }
            Err(PrepareError::Transcoder(msg)) => Err(anyhow!("transcoder failure: {}", msg).into()),
        }
    }
}

fn to_document(prepared: &PreparedPayload) -> ImageDocument {
    ImageDocument {
        filename: prepared.filename.clone(),
        content_type: prepared.content_type.clone(),
        encoded_payload: prepared.encoded_payload.clone(),
    }
}
