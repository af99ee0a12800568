//! The compact SPZ encoding: a 16-byte header followed by quantized
//! attribute sections, all wrapped in one compressed frame.

use log::{debug, warn};
use zerocopy::{FromBytes, IntoBytes};

use crate::cloud::{GaussianCloud, MAX_SH_DEGREE};
use crate::common::{
    dim_for_degree, fixed24_saturates, half_to_float, pack_fixed24, pack_quat_first_three,
    pack_quat_smallest_three, quantize_alpha, quantize_color, quantize_scale, quantize_sh,
    sh_bucket, unpack_fixed24, unpack_quat_first_three, unpack_quat_smallest_three,
    unquantize_alpha, unquantize_color, unquantize_scale, unquantize_sh,
};
use crate::compression::{compress, decompress};
use crate::error::{Result, SpzError};
use crate::options::EncodeOptions;
use crate::structures::{
    PackedGaussians, PackedGaussiansHeader, PackedGaussiansView, SpzVersion, HEADER_SIZE, MAGIC,
};

/// Fixed-point positions must fit a 24-bit integer with a sign bit.
const MAX_FRACTIONAL_BITS: u8 = 23;

pub fn pack_gaussians(gc: &GaussianCloud, options: &EncodeOptions) -> Result<PackedGaussians> {
    gc.validate()?;
    if options.version.uses_float16() {
        return Err(SpzError::UnsupportedVersion(options.version.as_u32()));
    }
    if options.fractional_bits > MAX_FRACTIONAL_BITS {
        return Err(SpzError::MalformedHeader(format!(
            "fractional bits {} exceed {}",
            options.fractional_bits, MAX_FRACTIONAL_BITS
        )));
    }

    let fractional_bits = options.fractional_bits;
    let sh_per_point = gc.sh_dim() * 3;

    let clamped = gc
        .positions
        .iter()
        .filter(|&&val| fixed24_saturates(val, fractional_bits))
        .count();
    if clamped > 0 {
        warn!(
            "Clamped {} position components outside +/-{} to the fixed-point range",
            clamped,
            (1u32 << (23 - fractional_bits as u32))
        );
    }

    let positions: Vec<u8> = gc
        .positions
        .iter()
        .flat_map(|&val| pack_fixed24(val, fractional_bits))
        .collect();

    let scales: Vec<u8> = gc.scales.iter().map(|&s| quantize_scale(s)).collect();

    let rotations: Vec<u8> = if options.version.uses_quat_smallest_three() {
        gc.rotations
            .chunks_exact(4)
            .flat_map(|q| pack_quat_smallest_three((q[0], q[1], q[2], q[3])))
            .collect()
    } else {
        gc.rotations
            .chunks_exact(4)
            .flat_map(|q| pack_quat_first_three((q[0], q[1], q[2], q[3])))
            .collect()
    };

    let alphas: Vec<u8> = gc.alphas.iter().map(|&a| quantize_alpha(a)).collect();

    let colors: Vec<u8> = gc.colors.iter().map(|&c| quantize_color(c)).collect();

    let sh = if sh_per_point > 0 {
        gc.sh
            .chunks_exact(sh_per_point)
            .flat_map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .map(|(j, &x)| quantize_sh(x, sh_bucket(j)))
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(PackedGaussians {
        num_points: gc.num_points,
        sh_degree: gc.sh_degree,
        fractional_bits,
        antialiased: gc.antialiased,
        version: options.version,
        positions,
        scales,
        rotations,
        alphas,
        colors,
        sh,
    })
}

pub fn unpack_gaussians(pg: &PackedGaussiansView) -> Result<GaussianCloud> {
    if pg.sh_degree > MAX_SH_DEGREE {
        return Err(SpzError::UnsupportedShDegree(pg.sh_degree));
    }
    let np = pg.num_points;
    let mut cloud = GaussianCloud::with_capacity(np, pg.sh_degree, pg.antialiased);

    let sections = [
        ("positions", pg.positions.len(), np * pg.version.position_bytes()),
        ("scales", pg.scales.len(), np * 3),
        ("rotations", pg.rotations.len(), np * pg.version.rotation_bytes()),
        ("alphas", pg.alphas.len(), np),
        ("colors", pg.colors.len(), np * 3),
        ("sh", pg.sh.len(), cloud.sh.len()),
    ];
    for (attribute, actual, expected) in sections {
        if actual != expected {
            return Err(SpzError::InconsistentCloud {
                attribute,
                expected,
                actual,
            });
        }
    }

    if pg.version.uses_float16() {
        for (chunk, pos) in pg
            .positions
            .chunks_exact(2)
            .zip(cloud.positions.iter_mut())
        {
            *pos = half_to_float(u16::from_le_bytes([chunk[0], chunk[1]]));
        }
    } else {
        for (chunk, pos) in pg
            .positions
            .chunks_exact(3)
            .zip(cloud.positions.iter_mut())
        {
            *pos = unpack_fixed24(chunk, pg.fractional_bits);
        }
    }

    cloud
        .scales
        .iter_mut()
        .zip(pg.scales.iter())
        .for_each(|(s, &pg_s)| *s = unquantize_scale(pg_s));

    let rotation_bytes = pg.version.rotation_bytes();
    pg.rotations
        .chunks_exact(rotation_bytes)
        .zip(cloud.rotations.chunks_exact_mut(4))
        .for_each(|(r_chunk, rot_chunk)| {
            let (x, y, z, w) = if pg.version.uses_quat_smallest_three() {
                unpack_quat_smallest_three(r_chunk)
            } else {
                unpack_quat_first_three(r_chunk)
            };
            rot_chunk.copy_from_slice(&[x, y, z, w]);
        });

    cloud
        .alphas
        .iter_mut()
        .zip(pg.alphas.iter())
        .for_each(|(a, &pg_a)| *a = unquantize_alpha(pg_a));

    cloud
        .colors
        .iter_mut()
        .zip(pg.colors.iter())
        .for_each(|(c, &pg_c)| *c = unquantize_color(pg_c));

    cloud
        .sh
        .iter_mut()
        .zip(pg.sh.iter())
        .for_each(|(sh, &pg_sh)| *sh = unquantize_sh(pg_sh));

    Ok(cloud)
}

pub fn serialize_packed_gaussians(pg: &PackedGaussians) -> Vec<u8> {
    let data_size = pg.positions.len()
        + pg.scales.len()
        + pg.rotations.len()
        + pg.alphas.len()
        + pg.colors.len()
        + pg.sh.len();

    let mut out = Vec::with_capacity(HEADER_SIZE + data_size);
    out.extend_from_slice(PackedGaussiansHeader::new(pg).as_bytes());
    out.extend_from_slice(&pg.positions);
    out.extend_from_slice(&pg.scales);
    out.extend_from_slice(&pg.rotations);
    out.extend_from_slice(&pg.alphas);
    out.extend_from_slice(&pg.colors);
    out.extend_from_slice(&pg.sh);
    out
}

pub fn deserialize_packed_gaussians(data: &[u8]) -> Result<PackedGaussiansView<'_>> {
    let (hdr, body) =
        PackedGaussiansHeader::read_from_prefix(data).map_err(|_| SpzError::Truncated {
            needed: HEADER_SIZE,
            available: data.len(),
        })?;

    let magic = hdr.magic.get();
    if magic != MAGIC {
        return Err(SpzError::BadMagic {
            found: magic,
            expected: MAGIC,
        });
    }
    let version = SpzVersion::from_u32(hdr.version.get())?;
    if hdr.sh_degree > MAX_SH_DEGREE {
        return Err(SpzError::UnsupportedShDegree(hdr.sh_degree));
    }
    if !version.uses_float16() && hdr.fractional_bits > MAX_FRACTIONAL_BITS {
        return Err(SpzError::MalformedHeader(format!(
            "fractional bits {} exceed {}",
            hdr.fractional_bits, MAX_FRACTIONAL_BITS
        )));
    }

    let np = hdr.num_points.get() as usize;
    if np == 0 {
        return Err(SpzError::EmptyCloud);
    }

    let positions_len = np * version.position_bytes();
    let scales_len = np * 3;
    let rotations_len = np * version.rotation_bytes();
    let alphas_len = np;
    let colors_len = np * 3;
    let sh_len = np * dim_for_degree(hdr.sh_degree) * 3;

    let needed = positions_len + scales_len + rotations_len + alphas_len + colors_len + sh_len;
    if body.len() < needed {
        return Err(SpzError::Truncated {
            needed: HEADER_SIZE + needed,
            available: data.len(),
        });
    }
    if body.len() > needed {
        debug!("Ignoring {} trailing bytes after SPZ sections", body.len() - needed);
    }

    let (positions, rest) = body.split_at(positions_len);
    let (scales, rest) = rest.split_at(scales_len);
    let (rotations, rest) = rest.split_at(rotations_len);
    let (alphas, rest) = rest.split_at(alphas_len);
    let (colors, rest) = rest.split_at(colors_len);
    let sh = &rest[..sh_len];

    Ok(PackedGaussiansView {
        num_points: np,
        sh_degree: hdr.sh_degree,
        fractional_bits: hdr.fractional_bits,
        antialiased: hdr.is_antialiased(),
        version,
        positions,
        scales,
        rotations,
        alphas,
        colors,
        sh,
    })
}

/// Validates, quantizes and serializes a cloud without compressing it.
pub fn prepare_uncompressed(cloud: &GaussianCloud, options: &EncodeOptions) -> Result<Vec<u8>> {
    let packed = pack_gaussians(cloud, options)?;
    Ok(serialize_packed_gaussians(&packed))
}

/// Decodes an already decompressed SPZ stream.
pub fn load_spz_uncompressed(data: &[u8]) -> Result<GaussianCloud> {
    let packed = deserialize_packed_gaussians(data)?;
    unpack_gaussians(&packed)
}

pub fn save_spz(cloud: &GaussianCloud, options: &EncodeOptions) -> Result<Vec<u8>> {
    let uncompressed = prepare_uncompressed(cloud, options)?;
    let compressed = compress(
        &uncompressed,
        options.compression,
        options.effective_level(),
        options.workers,
    )?;
    debug!(
        "Encoded {} points (SH degree {}) into {} bytes, {} before compression",
        cloud.num_points,
        cloud.sh_degree,
        compressed.len(),
        uncompressed.len()
    );
    Ok(compressed)
}

pub fn load_spz(spz_data: &[u8]) -> Result<GaussianCloud> {
    let uncompressed = decompress(spz_data)?;
    let cloud = load_spz_uncompressed(&uncompressed)?;
    debug!(
        "Decoded {} points (SH degree {}) from {} bytes",
        cloud.num_points,
        cloud.sh_degree,
        spz_data.len()
    );
    Ok(cloud)
}

cfg_if::cfg_if! {
if #[cfg(feature = "async")] {
    use crate::compression::{compress_async, decompress_async};

    #[inline(never)]
    pub async fn save_spz_async(
        cloud: &GaussianCloud,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>> {
        let uncompressed = prepare_uncompressed(cloud, options)?;
        compress_async(
            &uncompressed,
            options.compression,
            options.effective_level(),
            options.workers,
        )
        .await
    }

    #[inline(never)]
    pub async fn load_spz_async(spz_data: &[u8]) -> Result<GaussianCloud> {
        let uncompressed = decompress_async(spz_data).await?;
        load_spz_uncompressed(&uncompressed)
    }
}
}
