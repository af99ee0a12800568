mod convert;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{debug, info};

use convert::Conversion;

#[derive(Parser, Debug)]
#[command(
    name = "spz-convert",
    version,
    author = "Denis Avvakumov",
    about = "Converts Gaussian splats between PLY and SPZ",
    after_help = "Supported conversions:\n  .ply -> .spz\n  .spz -> .ply"
)]
pub struct Cli {
    #[arg(value_name = "INPUT", help = "Path to the input file (.ply or .spz).")]
    input: PathBuf,

    #[arg(value_name = "OUTPUT", help = "Path to the output file.")]
    output: PathBuf,

    #[arg(
        short = 'c',
        long = "compression-level",
        value_name = "LEVEL",
        default_value = "3",
        help = "Set the compression level (SPZ output only)."
    )]
    compression_level: u32,

    #[arg(
        short = 'w',
        long = "workers",
        value_name = "WORKERS",
        default_value = "3",
        help = "Set the workers count for ZSTD."
    )]
    workers: u32,

    #[arg(
        long = "spz-version",
        value_name = "VERSION",
        default_value = "3",
        value_parser = clap::value_parser!(u32).range(2..=3),
        help = "SPZ layout version to write."
    )]
    spz_version: u32,

    #[arg(long = "gzip", help = "Compress SPZ output with gzip instead of zstd.")]
    gzip: bool,

    #[arg(
        short = 'n',
        long = "normals",
        help = "Include zeroed normals in the output PLY file."
    )]
    include_normals: bool,

    #[arg(
        short = 'a',
        long = "async",
        help = "Enable asynchronous compression/decompression mode."
    )]
    async_mode: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = Conversion::from_cli(&cli).and_then(|conversion| {
        debug!(
            "Mode: {} {} | Input: {} | Output: {}",
            if cli.async_mode { "Asynchronous" } else { "Synchronous" },
            conversion.direction(),
            cli.input.display(),
            cli.output.display()
        );
        conversion.run()
    });

    match result {
        Ok(summary) => {
            info!(
                "{} points, SH degree {}, {} ms",
                summary.num_points, summary.sh_degree, summary.elapsed_ms
            );
            println!(
                "Successfully converted {} to {}",
                cli.input.display(),
                cli.output.display()
            );
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
