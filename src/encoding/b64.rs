//! Base64 helpers

use base64::{engine::general_purpose::STANDARD, Engine};

/// Length of the padded base64 text for `len` raw bytes, without encoding.
pub fn b64_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}

pub fn encode_b64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode_b64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_b64_len_matches_encoder() {
        for n in [0usize, 1, 2, 3, 4, 5, 10, 299, 300, 301, 1024] {
            let data = vec![0xABu8; n];
            assert_eq!(b64_len(n), encode_b64(&data).len(), "len {}", n);
        }
    }

    #[test]
    fn test_ten_bytes_is_sixteen_chars() {
        assert_eq!(b64_len(10), 16);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_b64("not base64!!").is_err());
        assert_eq!(decode_b64("aGVsbG8=").unwrap(), b"hello");
    }
}
