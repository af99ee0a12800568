use std::io::{Cursor, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use zstd::stream::{decode_all, Encoder};

use crate::error::{Result, SpzError};
use crate::options::Compression;

const ZSTD_FRAME_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const GZIP_FRAME_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Identifies the compressor from the first bytes of a frame.
pub fn detect_compression(data: &[u8]) -> Option<Compression> {
    if data.starts_with(&ZSTD_FRAME_MAGIC) {
        Some(Compression::Zstd)
    } else if data.starts_with(&GZIP_FRAME_MAGIC) {
        Some(Compression::Gzip)
    } else {
        None
    }
}

fn unrecognized_frame() -> SpzError {
    SpzError::Decompress("Unrecognized compression frame".to_string())
}

#[inline(never)]
fn compress_zstd(data: &[u8], level: u32, workers: u32) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(Vec::new(), level as i32)
        .map_err(|e| SpzError::Compress(format!("Encoder creation failed: {}", e)))?;
    encoder
        .multithread(workers)
        .map_err(|e| SpzError::Compress(format!("Setting multithread failed: {}", e)))?;
    encoder
        .write_all(data)
        .map_err(|e| SpzError::Compress(format!("Writing data failed: {}", e)))?;

    encoder
        .finish()
        .map_err(|e| SpzError::Compress(format!("Finalizing compression failed: {}", e)))
}

#[inline(never)]
fn compress_gzip(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| SpzError::Compress(format!("Writing data failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| SpzError::Compress(format!("Finalizing compression failed: {}", e)))
}

pub fn compress(
    data: &[u8],
    compression: Compression,
    level: u32,
    workers: u32,
) -> Result<Vec<u8>> {
    let level = level.min(compression.max_level());
    match compression {
        Compression::Zstd => compress_zstd(data, level, workers),
        Compression::Gzip => compress_gzip(data, level),
    }
}

#[inline(never)]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    match detect_compression(data).ok_or_else(unrecognized_frame)? {
        Compression::Zstd => decode_all(Cursor::new(data))
            .map_err(|e| SpzError::Decompress(format!("zstd: {}", e))),
        Compression::Gzip => {
            let mut decoder = GzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| SpzError::Decompress(format!("gzip: {}", e)))?;
            Ok(out)
        }
    }
}

cfg_if::cfg_if! {
if #[cfg(feature = "async")] {
    use async_compression::zstd::CParameter;
    use async_compression::Level;
    use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
    use async_compression::tokio::write::{GzipEncoder, ZstdEncoder};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

    #[inline(never)]
    pub async fn compress_async(
        data: &[u8],
        compression: Compression,
        level: u32,
        workers: u32,
    ) -> Result<Vec<u8>> {
        let level = level.min(compression.max_level());
        let mut compressed = Vec::new();
        match compression {
            Compression::Zstd => {
                let params = &[CParameter::nb_workers(workers)];
                let mut encoder = ZstdEncoder::with_quality_and_params(
                    &mut compressed,
                    Level::Precise(level as i32),
                    params,
                );
                encoder.write_all(data)
                    .await
                    .map_err(|e| SpzError::Compress(e.to_string()))?;
                encoder.shutdown()
                    .await
                    .map_err(|e| SpzError::Compress(e.to_string()))?;
            }
            Compression::Gzip => {
                let mut encoder =
                    GzipEncoder::with_quality(&mut compressed, Level::Precise(level as i32));
                encoder.write_all(data)
                    .await
                    .map_err(|e| SpzError::Compress(e.to_string()))?;
                encoder.shutdown()
                    .await
                    .map_err(|e| SpzError::Compress(e.to_string()))?;
            }
        }
        Ok(compressed)
    }

    #[inline(never)]
    pub async fn decompress_async(data: &[u8]) -> Result<Vec<u8>> {
        let compression = detect_compression(data).ok_or_else(unrecognized_frame)?;
        let reader = BufReader::new(Cursor::new(data));
        let mut decompressed = Vec::new();
        match compression {
            Compression::Zstd => {
                ZstdDecoder::new(reader)
                    .read_to_end(&mut decompressed)
                    .await
                    .map_err(|e| SpzError::Decompress(format!("zstd: {}", e)))?;
            }
            Compression::Gzip => {
                GzipDecoder::new(reader)
                    .read_to_end(&mut decompressed)
                    .await
                    .map_err(|e| SpzError::Decompress(format!("gzip: {}", e)))?;
            }
        }
        Ok(decompressed)
    }
}
}
