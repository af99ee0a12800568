//! Path-based wrappers around the codec.
//!
//! Outputs are encoded in memory, written to a hidden sibling file and then
//! renamed over the destination, so a failed save never leaves a partial file
//! that looks valid.

use std::fs;
use std::io::Write;
use std::path::Path;

use log::debug;
use tempfile::Builder;

use crate::cloud::GaussianCloud;
use crate::error::Result;
use crate::options::{EncodeOptions, PlyWriteOptions};
use crate::ply::{load_splat_from_ply, save_splat_to_ply};
use crate::spz::{load_spz, save_spz};

/// Writes `bytes` to `path` via a uniquely named temporary sibling and a
/// rename. The temporary file is deleted if any step fails.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = Builder::new()
        .prefix(".spz-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

pub fn read_spz_file(path: impl AsRef<Path>) -> Result<GaussianCloud> {
    let data = fs::read(path.as_ref())?;
    load_spz(&data)
}

pub fn write_spz_file(
    cloud: &GaussianCloud,
    path: impl AsRef<Path>,
    options: &EncodeOptions,
) -> Result<()> {
    let bytes = save_spz(cloud, options)?;
    write_atomically(path.as_ref(), &bytes)
}

pub fn read_ply_file(path: impl AsRef<Path>) -> Result<GaussianCloud> {
    let data = fs::read(path.as_ref())?;
    load_splat_from_ply(&data)
}

pub fn write_ply_file(
    cloud: &GaussianCloud,
    path: impl AsRef<Path>,
    options: &PlyWriteOptions,
) -> Result<()> {
    let bytes = save_splat_to_ply(cloud, options)?;
    write_atomically(path.as_ref(), &bytes)
}
