//! Storage module for image document persistence

pub mod traits;
pub mod sqlite;
pub mod memory;

pub use traits::{ImageStore, ImageDocument, ImageRecord};
pub use sqlite::SqliteStorage;
pub use memory::MemoryStore;
