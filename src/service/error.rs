//! Service error kinds

use thiserror::Error;

use crate::encoding::Rejection;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Upload refused by the encoding gate
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Image not found")]
    NotFound,

    /// Record exists but lacks filename, content type or payload
    #[error("Incomplete image data")]
    IncompleteData,

    /// Anything not classified above
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
