//! Encoding gate module
//!
//! Decides whether an upload can be stored as-is or must be transcoded to
//! WebP before it fits under the base64 size ceiling.

pub mod b64;
pub mod gate;
pub mod transcode;

pub use b64::{b64_len, decode_b64, encode_b64};
pub use gate::{EncodingGate, PrepareError, PreparedPayload, Rejection};
