use std::io::{Read, Write};

use acorn_core::{AcornError, AcornResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Compression algorithm a [`crate::RootKind::Compression`] root applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgo {
    Gzip,
    Brotli,
    None,
}

impl CompressionAlgo {
    pub fn signature(&self) -> &'static str {
        match self {
            CompressionAlgo::Gzip => "compression:gzip",
            CompressionAlgo::Brotli => "compression:brotli",
            CompressionAlgo::None => "compression:none",
        }
    }

    pub fn compress(&self, bytes: Vec<u8>) -> AcornResult<Vec<u8>> {
        match self {
            CompressionAlgo::None => Ok(bytes),
            CompressionAlgo::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(&bytes)
                    .map_err(|e| AcornError::Serialization(e.to_string()))?;
                encoder.finish().map_err(|e| AcornError::Serialization(e.to_string()))
            }
            CompressionAlgo::Brotli => {
                let mut out = Vec::new();
                let params = brotli::enc::BrotliEncoderParams::default();
                brotli::BrotliCompress(&mut bytes.as_slice(), &mut out, &params)
                    .map_err(|e| AcornError::Serialization(e.to_string()))?;
                Ok(out)
            }
        }
    }

    pub fn decompress(&self, bytes: Vec<u8>) -> AcornResult<Vec<u8>> {
        match self {
            CompressionAlgo::None => Ok(bytes),
            CompressionAlgo::Gzip => {
                let mut decoder = GzDecoder::new(bytes.as_slice());
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| AcornError::Serialization(e.to_string()))?;
                Ok(out)
            }
            CompressionAlgo::Brotli => {
                let mut out = Vec::new();
                brotli::BrotliDecompress(&mut bytes.as_slice(), &mut out)
                    .map_err(|e| AcornError::Serialization(e.to_string()))?;
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trips() {
        let algo = CompressionAlgo::Gzip;
        let original = b"the quick brown fox jumps over the lazy dog".to_vec();
        let compressed = algo.compress(original.clone()).unwrap();
        assert_eq!(algo.decompress(compressed).unwrap(), original);
    }

    #[test]
    fn brotli_round_trips() {
        let algo = CompressionAlgo::Brotli;
        let original = b"the quick brown fox jumps over the lazy dog".to_vec();
        let compressed = algo.compress(original.clone()).unwrap();
        assert_eq!(algo.decompress(compressed).unwrap(), original);
    }

    #[test]
    fn none_is_passthrough() {
        let algo = CompressionAlgo::None;
        let original = b"unchanged".to_vec();
        assert_eq!(algo.compress(original.clone()).unwrap(), original);
    }
}
