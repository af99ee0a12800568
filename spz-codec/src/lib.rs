//! Conversion of 3D Gaussian splat clouds between the compact SPZ format and
//! the 3DGS PLY layout.
//!
//! [`GaussianCloud`] is the hub: [`load_spz`]/[`save_spz`] and
//! [`load_splat_from_ply`]/[`save_splat_to_ply`] convert it to and from bytes,
//! and [`fs`] wraps them for paths. Everything here is a pure function of its
//! inputs and safe to call from many threads at once.
//!
//! The [`compat`] module offers the same operations with a zero-point cloud /
//! `false` failure convention for embedders that cannot carry a [`SpzError`].

mod cloud;
pub mod common;
pub mod compat;
pub mod compression;
pub mod error;
pub mod fs;
mod options;
pub mod ply;
pub mod spz;
mod structures;

pub use cloud::{GaussianCloud, MAX_SH_DEGREE};
pub use error::{Result, SpzError};
pub use options::{Compression, EncodeOptions, PlyWriteOptions};
pub use ply::{load_splat_from_ply, save_splat_to_ply};
pub use spz::{load_spz, save_spz};
pub use structures::{
    PackedGaussians, PackedGaussiansHeader, PackedGaussiansView, SpzVersion, FLAG_ANTIALIASED,
    HEADER_SIZE, MAGIC,
};

#[cfg(feature = "async")]
pub use spz::{load_spz_async, save_spz_async};
