//! Service layer module

pub mod image_service;
pub mod error;
pub mod types;

pub use image_service::ImageService;
pub use error::{ServiceError, ServiceResult};
pub use types::*;
