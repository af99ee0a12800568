use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::debug;
use spz_codec::common::ZSTD_MAX_COMPRESSION_LVL;
use spz_codec::fs::{read_ply_file, write_atomically};
use spz_codec::{
    load_spz, load_spz_async, save_splat_to_ply, save_spz, save_spz_async, Compression,
    EncodeOptions, GaussianCloud, PlyWriteOptions, SpzError, SpzVersion,
};
use thiserror::Error;

use crate::Cli;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(
        "Unsupported input file extension for {}: supported extensions are .ply and .spz",
        .0.display()
    )]
    UnsupportedExtension(PathBuf),

    #[error("Input file does not exist: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Failed to load Gaussian cloud from {}: {source}", path.display())]
    Load { path: PathBuf, source: SpzError },

    #[error("Failed to save Gaussian cloud to {}: {source}", path.display())]
    Save { path: PathBuf, source: SpzError },

    #[error("Failed to start async runtime: {0}")]
    Runtime(io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    PlyToSpz,
    SpzToPly,
}

impl Direction {
    /// Picks the direction from the input extension, case-insensitively.
    pub fn from_input(path: &Path) -> Result<Self, CliError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase());
        match ext.as_deref() {
            Some("ply") => Ok(Direction::PlyToSpz),
            Some("spz") => Ok(Direction::SpzToPly),
            _ => Err(CliError::UnsupportedExtension(path.to_path_buf())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::PlyToSpz => write!(f, "PLY -> SPZ"),
            Direction::SpzToPly => write!(f, "SPZ -> PLY"),
        }
    }
}

#[derive(Debug)]
pub struct Summary {
    pub num_points: usize,
    pub sh_degree: u8,
    pub elapsed_ms: u128,
}

#[derive(Debug)]
pub struct Conversion {
    direction: Direction,
    input: PathBuf,
    output: PathBuf,
    encode: EncodeOptions,
    ply: PlyWriteOptions,
    async_mode: bool,
}

impl Conversion {
    /// Validates the request without touching the codec.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let direction = Direction::from_input(&cli.input)?;
        if !cli.input.is_file() {
            return Err(CliError::MissingInput(cli.input.clone()));
        }

        let compression = if cli.gzip {
            Compression::Gzip
        } else {
            Compression::Zstd
        };
        let version = if cli.spz_version == 2 {
            SpzVersion::V2
        } else {
            SpzVersion::V3
        };

        Ok(Conversion {
            direction,
            input: cli.input.clone(),
            output: cli.output.clone(),
            encode: EncodeOptions {
                version,
                compression,
                compression_level: cli.compression_level.min(ZSTD_MAX_COMPRESSION_LVL),
                workers: cli.workers,
                ..Default::default()
            },
            ply: PlyWriteOptions {
                include_normals: cli.include_normals,
            },
            async_mode: cli.async_mode,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    fn load_error(&self, source: SpzError) -> CliError {
        CliError::Load {
            path: self.input.clone(),
            source,
        }
    }

    fn save_error(&self, source: SpzError) -> CliError {
        CliError::Save {
            path: self.output.clone(),
            source,
        }
    }

    fn load(&self, rt: Option<&tokio::runtime::Runtime>) -> Result<GaussianCloud, CliError> {
        let cloud = match self.direction {
            Direction::PlyToSpz => read_ply_file(&self.input),
            Direction::SpzToPly => fs::read(&self.input)
                .map_err(SpzError::from)
                .and_then(|data| match rt {
                    Some(rt) => rt.block_on(load_spz_async(&data)),
                    None => load_spz(&data),
                }),
        }
        .map_err(|e| self.load_error(e))?;

        if cloud.is_empty() {
            return Err(self.load_error(SpzError::EmptyCloud));
        }
        Ok(cloud)
    }

    fn encode(
        &self,
        cloud: &GaussianCloud,
        rt: Option<&tokio::runtime::Runtime>,
    ) -> Result<Vec<u8>, SpzError> {
        match self.direction {
            Direction::PlyToSpz => match rt {
                Some(rt) => rt.block_on(save_spz_async(cloud, &self.encode)),
                None => save_spz(cloud, &self.encode),
            },
            Direction::SpzToPly => save_splat_to_ply(cloud, &self.ply),
        }
    }

    pub fn run(&self) -> Result<Summary, CliError> {
        let start = Instant::now();

        let rt = if self.async_mode {
            Some(
                tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .map_err(CliError::Runtime)?,
            )
        } else {
            None
        };

        let cloud = self.load(rt.as_ref())?;
        debug!(
            "Loaded {} points from {}",
            cloud.num_points,
            self.input.display()
        );

        let bytes = self
            .encode(&cloud, rt.as_ref())
            .map_err(|e| self.save_error(e))?;
        write_atomically(&self.output, &bytes).map_err(|e| self.save_error(e))?;

        Ok(Summary {
            num_points: cloud.num_points,
            sh_degree: cloud.sh_degree,
            elapsed_ms: start.elapsed().as_millis(),
        })
    }
}
