//! JSON + gzip value encoding for store payloads (spec §4.1: "compresses
//! payloads above a threshold, default 1 KiB").

use std::io::{Read, Write};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

pub const COMPRESSION_THRESHOLD_BYTES: usize = 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Encode a value as JSON, gzip-compressing it when the JSON form exceeds
/// [`COMPRESSION_THRESHOLD_BYTES`]. The gzip magic bytes prefix compressed
/// payloads so `decode` can tell them apart without a side channel.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    if json.len() <= COMPRESSION_THRESHOLD_BYTES {
        return Ok(json);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    encoder.finish().map_err(Into::into)
}

/// Inverse of [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut json = Vec::new();
        decoder.read_to_end(&mut json)?;
        Ok(serde_json::from_slice(&json)?)
    } else {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Small {
        n: u32,
    }

    #[test]
    fn small_values_round_trip_uncompressed() {
        let value = Small { n: 42 };
        let encoded = encode(&value).unwrap();
        assert!(!encoded.starts_with(&GZIP_MAGIC));
        assert_eq!(decode::<Small>(&encoded).unwrap(), value);
    }

    #[test]
    fn large_values_round_trip_compressed() {
        let value = "x".repeat(COMPRESSION_THRESHOLD_BYTES * 2);
        let encoded = encode(&value).unwrap();
        assert!(encoded.starts_with(&GZIP_MAGIC));
        assert_eq!(decode::<String>(&encoded).unwrap(), value);
    }
}
