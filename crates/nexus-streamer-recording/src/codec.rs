//! Chunk compression codecs.
//!
//! Every chunk of a recorded array is compressed independently, so a reader
//! can decompress any single chunk without touching its neighbours.

use nexus_streamer_types::CompressionKind;

use crate::RecordingError;

/// Compresses and decompresses a single chunk.
pub trait Codec: Send + Sync {
    fn kind(&self) -> CompressionKind;

    fn compress(&self, chunk: &[u8]) -> Result<Vec<u8>, RecordingError>;

    fn decompress(&self, stored: &[u8]) -> Result<Vec<u8>, RecordingError>;
}

/// Stores chunks as raw little-endian bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::None
    }

    fn compress(&self, chunk: &[u8]) -> Result<Vec<u8>, RecordingError> {
        Ok(chunk.to_vec())
    }

    fn decompress(&self, stored: &[u8]) -> Result<Vec<u8>, RecordingError> {
        Ok(stored.to_vec())
    }
}

/// LZ4 block compression with the decompressed size prepended.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Lz4
    }

    fn compress(&self, chunk: &[u8]) -> Result<Vec<u8>, RecordingError> {
        Ok(lz4_flex::compress_prepend_size(chunk))
    }

    fn decompress(&self, stored: &[u8]) -> Result<Vec<u8>, RecordingError> {
        lz4_flex::decompress_size_prepended(stored).map_err(|e| {
            RecordingError::DecompressionFailed {
                codec: "lz4",
                reason: e.to_string(),
            }
        })
    }
}

/// Zstandard frames at a fixed compression level.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    /// Compression level (1-22).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl Codec for ZstdCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Zstd
    }

    fn compress(&self, chunk: &[u8]) -> Result<Vec<u8>, RecordingError> {
        zstd::encode_all(chunk, self.level).map_err(|e| RecordingError::CompressionFailed {
            codec: "zstd",
            reason: e.to_string(),
        })
    }

    fn decompress(&self, stored: &[u8]) -> Result<Vec<u8>, RecordingError> {
        zstd::decode_all(stored).map_err(|e| RecordingError::DecompressionFailed {
            codec: "zstd",
            reason: e.to_string(),
        })
    }
}

/// Looks up the codec for a chunk's [`CompressionKind`].
#[derive(Debug, Default)]
pub struct CodecRegistry {
    raw: RawCodec,
    lz4: Lz4Codec,
    zstd: ZstdCodec,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `level` for Zstandard compression. Decompression is unaffected.
    pub fn with_zstd_level(level: i32) -> Self {
        Self {
            zstd: ZstdCodec { level },
            ..Self::default()
        }
    }

    pub fn get(&self, kind: CompressionKind) -> &dyn Codec {
        match kind {
            CompressionKind::None => &self.raw,
            CompressionKind::Lz4 => &self.lz4,
            CompressionKind::Zstd => &self.zstd,
        }
    }

    pub fn compress(&self, kind: CompressionKind, chunk: &[u8]) -> Result<Vec<u8>, RecordingError> {
        self.get(kind).compress(chunk)
    }

    pub fn decompress(
        &self,
        kind: CompressionKind,
        stored: &[u8],
    ) -> Result<Vec<u8>, RecordingError> {
        self.get(kind).decompress(stored)
    }
}
