use crate::common::{
    GZIP_MAX_COMPRESSION_LVL, POSITION_FRACTIONAL_BITS, ZSTD_DEFAULT_COMPRESSION_LVL,
    ZSTD_MAX_COMPRESSION_LVL,
};
use crate::structures::SpzVersion;

/// General-purpose compressor wrapped around the packed SPZ stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Zstd,
    Gzip,
}

impl Compression {
    pub fn max_level(self) -> u32 {
        match self {
            Compression::Zstd => ZSTD_MAX_COMPRESSION_LVL,
            Compression::Gzip => GZIP_MAX_COMPRESSION_LVL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub version: SpzVersion,
    pub compression: Compression,
    pub compression_level: u32,
    /// zstd worker threads; 0 compresses on the calling thread.
    pub workers: u32,
    pub fractional_bits: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            version: SpzVersion::default(),
            compression: Compression::default(),
            compression_level: ZSTD_DEFAULT_COMPRESSION_LVL,
            workers: 0,
            fractional_bits: POSITION_FRACTIONAL_BITS,
        }
    }
}

impl EncodeOptions {
    /// Compression level clamped to what the selected compressor accepts.
    pub fn effective_level(&self) -> u32 {
        self.compression_level.min(self.compression.max_level())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlyWriteOptions {
    /// Emit zeroed `nx, ny, nz` properties for viewers that expect them.
    pub include_normals: bool,
}
