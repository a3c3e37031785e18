//! Image service configuration

use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub rest_port: u16,
    /// Open all origins/methods/headers when set
    pub cors_enabled: bool,
    /// Request body limit; uploads above the base64 ceiling still need to
    /// reach the transcoder, so this is much larger than `max_b64_bytes`
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    pub sqlite_path: PathBuf,
    /// Collection (table) holding the image documents
    pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_b64_bytes: usize,
    pub webp_quality: f32,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> String {
        std::env::var("IMAGES_CONFIG").unwrap_or_else(|_| "config.toml".to_string())
    }

    /// Apply environment overrides on top of the file/default values.
    pub fn apply_env(mut self) -> anyhow::Result<Self> {
        if let Ok(port) = std::env::var("PORT") {
            self.server.rest_port = port.parse().context("PORT must be a port number")?;
        }

        if let Ok(cors) = std::env::var("CORS_ENABLED") {
            self.server.cors_enabled = parse_flag(&cors)
                .with_context(|| format!("CORS_ENABLED: invalid boolean {cors:?}"))?;
        }

        if let Ok(kind) = std::env::var("STORAGE_TYPE") {
            self.storage.storage_type = match kind.to_ascii_lowercase().as_str() {
                "sqlite" => StorageType::Sqlite,
                "memory" => StorageType::Memory,
                other => bail!("STORAGE_TYPE: unknown storage type {other:?}"),
            };
        }

        if let Ok(path) = std::env::var("SQLITE_PATH") {
            self.storage.sqlite_path = PathBuf::from(path);
        }

        if let Ok(collection) = std::env::var("IMAGE_COLLECTION")
            .or_else(|_| std::env::var("FIREBASE_COLLECTION"))
        {
            self.storage.collection = collection;
        }

        if let Ok(max) = std::env::var("MAX_B64_BYTES") {
            self.limits.max_b64_bytes = max
                .parse()
                .context("MAX_B64_BYTES must be a non-negative integer")?;
        }

        Ok(self)
    }

    /// Reject values that would make the service misbehave at runtime.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_valid_collection(&self.storage.collection) {
            bail!(
                "collection name {:?} must match [A-Za-z_][A-Za-z0-9_]*",
                self.storage.collection
            );
        }

        if !(0.0..=100.0).contains(&self.limits.webp_quality) {
            bail!("webp_quality must be within 0..=100, got {}", self.limits.webp_quality);
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rest_port: 3000,
            cors_enabled: true,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            sqlite_path: PathBuf::from("data/images.db"),
            collection: "images".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_b64_bytes: 1024 * 1024,
            webp_quality: 80.0,
        }
    }
}

/// Parse a boolean the way form/query flags are usually written.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Collection names end up as SQL identifiers.
pub fn is_valid_collection(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
