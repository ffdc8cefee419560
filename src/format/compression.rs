//! zlib data-block compression with a 4-byte big-endian size prefix.
//!
//! The framing matches qCompress/qUncompress so existing files stay readable.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::types::error::{QnmsError, QnmsResult};
use crate::types::MAX_COMPRESSION_LEVEL;

/// Compress `data` at `level` (1..=9). Level 0 or empty input passes through unchanged.
pub fn compress(data: &[u8], level: u8) -> QnmsResult<Vec<u8>> {
    if level > MAX_COMPRESSION_LEVEL {
        return Err(QnmsError::InvalidCompressionLevel(level));
    }
    if level == 0 || data.is_empty() {
        return Ok(data.to_vec());
    }
    let size = u32::try_from(data.len())
        .map_err(|_| QnmsError::Compression("input larger than 4 GiB".into()))?;

    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    out.extend_from_slice(&size.to_be_bytes());
    let mut encoder = ZlibEncoder::new(out, Compression::new(u32::from(level)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inverse of [`compress`]. Empty input passes through unchanged.
pub fn decompress(data: &[u8]) -> QnmsResult<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < 4 {
        return Err(QnmsError::Compression("missing size prefix".into()));
    }
    let expected = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;

    // The prefix comes from the file; inflate at most one byte past it.
    let mut out = Vec::with_capacity(expected.min(data.len().saturating_mul(4)));
    ZlibDecoder::new(&data[4..])
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| QnmsError::Compression(e.to_string()))?;
    if out.len() > expected {
        return Err(QnmsError::Compression(format!(
            "size prefix says {} bytes, stream holds more",
            expected
        )));
    }
    if out.len() < expected {
        return Err(QnmsError::Compression(format!(
            "size prefix says {} bytes, stream holds {}",
            expected,
            out.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_levels() {
        let original = b"Hello, this is a test of compression!".repeat(100);
        for level in 1..=9 {
            let packed = compress(&original, level).unwrap();
            assert!(packed.len() < original.len());
            assert_eq!(decompress(&packed).unwrap(), original);
        }
    }

    #[test]
    fn level_zero_is_passthrough() {
        let data = b"not compressed".to_vec();
        assert_eq!(compress(&data, 0).unwrap(), data);
    }

    #[test]
    fn empty_is_passthrough() {
        assert!(compress(&[], 6).unwrap().is_empty());
        assert!(decompress(&[]).unwrap().is_empty());
    }

    #[test]
    fn size_prefix_is_big_endian() {
        let packed = compress(&[7u8; 300], 5).unwrap();
        assert_eq!(&packed[..4], &300u32.to_be_bytes());
    }

    #[test]
    fn rejects_bad_level_and_garbage() {
        assert!(matches!(
            compress(b"x", 10),
            Err(QnmsError::InvalidCompressionLevel(10))
        ));
        assert!(decompress(&[0, 0, 0, 5, 1, 2, 3]).is_err());
        assert!(decompress(&[1, 2]).is_err());
    }

    #[test]
    fn understated_size_prefix_stops_early() {
        let original = vec![0u8; 4 * 1024 * 1024];
        let mut packed = compress(&original, 9).unwrap();
        packed[..4].copy_from_slice(&16u32.to_be_bytes());
        let err = decompress(&packed).unwrap_err();
        assert!(
            matches!(&err, QnmsError::Compression(msg) if msg.contains("holds more")),
            "{err}"
        );
    }

    #[test]
    fn overstated_size_prefix_is_rejected() {
        let mut packed = compress(b"short payload", 6).unwrap();
        packed[..4].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(decompress(&packed), Err(QnmsError::Compression(_))));
    }
}
