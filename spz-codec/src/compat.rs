//! Sentinel-style entry points for embedders without structured errors.
//!
//! Loads return a zero-point [`GaussianCloud`] on failure and saves return
//! `false`. The underlying error is logged at `warn` level.

use std::path::Path;

use log::warn;

use crate::cloud::GaussianCloud;
use crate::error::Result;
use crate::fs::{read_ply_file, read_spz_file, write_ply_file, write_spz_file};
use crate::options::{EncodeOptions, PlyWriteOptions};

fn or_empty(result: Result<GaussianCloud>, what: &str) -> GaussianCloud {
    result.unwrap_or_else(|e| {
        warn!("Failed to load {}: {}", what, e);
        GaussianCloud::default()
    })
}

fn succeeded(result: Result<()>, what: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to save {}: {}", what, e);
            false
        }
    }
}

pub fn load_spz(data: &[u8]) -> GaussianCloud {
    or_empty(crate::spz::load_spz(data), "SPZ buffer")
}

pub fn load_spz_file(path: impl AsRef<Path>) -> GaussianCloud {
    let path = path.as_ref();
    or_empty(read_spz_file(path), &path.display().to_string())
}

/// Replaces `output` with the encoded cloud; leaves it empty on failure.
pub fn save_spz(cloud: &GaussianCloud, output: &mut Vec<u8>) -> bool {
    output.clear();
    match crate::spz::save_spz(cloud, &EncodeOptions::default()) {
        Ok(bytes) => {
            *output = bytes;
            true
        }
        Err(e) => succeeded(Err(e), "SPZ buffer"),
    }
}

pub fn save_spz_file(cloud: &GaussianCloud, path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    succeeded(
        write_spz_file(cloud, path, &EncodeOptions::default()),
        &path.display().to_string(),
    )
}

pub fn load_splat_from_ply(path: impl AsRef<Path>) -> GaussianCloud {
    let path = path.as_ref();
    or_empty(read_ply_file(path), &path.display().to_string())
}

pub fn load_splat_from_ply_buffer(data: &[u8]) -> GaussianCloud {
    or_empty(crate::ply::load_splat_from_ply(data), "PLY buffer")
}

pub fn save_splat_to_ply(cloud: &GaussianCloud, path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    succeeded(
        write_ply_file(cloud, path, &PlyWriteOptions::default()),
        &path.display().to_string(),
    )
}
