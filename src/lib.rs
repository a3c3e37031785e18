//! Base64 Image Store Library

pub mod config;
pub mod encoding;
pub mod service;
pub mod storage;
pub mod api;

pub use config::Config;
