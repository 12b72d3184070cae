//! The per-buffer decompression frame: `[ u64_le uncompressed_size |
//! compressed_bytes ]`, with `uncompressed_size == -1` meaning "stored
//! verbatim". One [`Decompressor`] is created per record batch and reused
//! across that batch's buffers.

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};
use ipc_core::errors::{Error, Result};

/// Wraps the codec declared on a record batch's `BodyCompression`. `None`
/// means the batch is uncompressed and buffers are read verbatim.
pub enum Decompressor {
    None,
    Lz4Frame,
    Zstd,
}

impl Decompressor {
    pub fn for_codec(codec: Option<arrow_ipc::CompressionType>) -> Result<Self> {
        match codec {
            None => Ok(Decompressor::None),
            Some(arrow_ipc::CompressionType::LZ4_FRAME) => Ok(Decompressor::Lz4Frame),
            Some(arrow_ipc::CompressionType::ZSTD) => Ok(Decompressor::Zstd),
            Some(other) => Err(Error::Unsupported(format!(
                "unsupported body compression codec: {other:?}"
            ))),
        }
    }

    /// Materializes one buffer's worth of bytes from `raw`, the buffer's
    /// declared byte range in the body. `raw.is_empty()` short-circuits to an
    /// empty buffer without inspecting the compression framing, per the
    /// primitive zero-length optimization.
    pub fn materialize(&self, raw: &[u8]) -> Result<Vec<u8>> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            Decompressor::None => Ok(raw.to_vec()),
            Decompressor::Lz4Frame | Decompressor::Zstd => {
                if raw.len() < 8 {
                    return Err(Error::Malformed(
                        "compressed buffer shorter than the 8-byte uncompressed-size prefix"
                            .to_string(),
                    ));
                }
                let uncompressed_size = LittleEndian::read_i64(&raw[..8]);
                let payload = &raw[8..];
                if uncompressed_size == -1 {
                    return Ok(payload.to_vec());
                }
                if uncompressed_size < 0 {
                    return Err(Error::Malformed(format!(
                        "negative uncompressed size {uncompressed_size} is not the -1 sentinel"
                    )));
                }
                let mut out = vec![0u8; uncompressed_size as usize];
                self.decompress_into(payload, &mut out)?;
                Ok(out)
            }
        }
    }

    fn decompress_into(&self, payload: &[u8], out: &mut [u8]) -> Result<()> {
        match self {
            Decompressor::None => unreachable!(),
            Decompressor::Lz4Frame => {
                let mut decoder = lz4_flex::frame::FrameDecoder::new(payload);
                decoder
                    .read_exact(out)
                    .map_err(|_| Error::Malformed("short LZ4 frame decompress".to_string()))
            }
            Decompressor::Zstd => {
                let mut decoder = zstd::stream::read::Decoder::new(payload)
                    .map_err(|e| Error::Malformed(format!("invalid zstd frame: {e}")))?;
                decoder
                    .read_exact(out)
                    .map_err(|_| Error::Malformed("short zstd frame decompress".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_sentinel_bypasses_codec() {
        let decompressor = Decompressor::Zstd;
        let mut raw = (-1i64).to_le_bytes().to_vec();
        raw.extend_from_slice(b"hello");
        let out = decompressor.materialize(&raw).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn empty_buffer_short_circuits() {
        let decompressor = Decompressor::None;
        assert!(decompressor.materialize(&[]).unwrap().is_empty());
    }

    #[test]
    fn zstd_round_trip() {
        let payload = b"the quick brown fox jumps over the lazy dog";
        let compressed = zstd::stream::encode_all(&payload[..], 0).unwrap();
        let mut raw = (payload.len() as i64).to_le_bytes().to_vec();
        raw.extend_from_slice(&compressed);
        let decompressor = Decompressor::Zstd;
        let out = decompressor.materialize(&raw).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn lz4_round_trip() {
        let payload = b"the quick brown fox jumps over the lazy dog";
        let mut compressed = Vec::new();
        {
            let mut encoder = lz4_flex::frame::FrameEncoder::new(&mut compressed);
            std::io::Write::write_all(&mut encoder, payload).unwrap();
            encoder.finish().unwrap();
        }
        let mut raw = (payload.len() as i64).to_le_bytes().to_vec();
        raw.extend_from_slice(&compressed);
        let decompressor = Decompressor::Lz4Frame;
        let out = decompressor.materialize(&raw).unwrap();
        assert_eq!(out, payload);
    }
}
