//! Quantization constants and helpers shared by the SPZ encoder and decoder.

use half::f16;

pub const ZSTD_MAX_COMPRESSION_LVL: u32 = 22;
pub const ZSTD_DEFAULT_COMPRESSION_LVL: u32 = 3;
pub const GZIP_MAX_COMPRESSION_LVL: u32 = 9;

/// Fractional bits of the 24-bit fixed-point positions written by the encoder.
pub const POSITION_FRACTIONAL_BITS: u8 = 12;
const POSITION_FIXED_MAX: i32 = (1 << 23) - 1;
const POSITION_FIXED_MIN: i32 = -(1 << 23);

/// Log-scales are stored as `(s + SCALE_OFFSET) * SCALE_FACTOR`.
pub const SCALE_OFFSET: f32 = 10.0;
pub const SCALE_FACTOR: f32 = 16.0;

/// DC colors are stored as `c * COLOR_SCALE * 255 + 127.5`.
pub const COLOR_SCALE: f32 = 0.15;

/// Bucket sizes for SH quantization: 5 bits for degree 1, 4 bits above.
pub const SH_BUCKET_DEGREE1: i32 = 8;
pub const SH_BUCKET_REST: i32 = 16;
/// Number of floats per point that belong to the degree-1 band.
pub const SH_DEGREE1_FLOATS: usize = 9;

const ROTATION_FIRST_THREE_SCALE: f32 = 127.5;
const ROTATION_SMALLEST_THREE_MAX: u32 = (1 << 9) - 1;

#[inline]
pub(crate) fn clamp_u8(x: f32) -> u8 {
    x.round().clamp(0.0, 255.0) as u8
}

#[inline]
pub(crate) fn quantize_sh(x: f32, bucket_size: i32) -> u8 {
    let q = (x * 128.0).round() as i32 + 128;
    let q = ((q + bucket_size / 2) / bucket_size) * bucket_size;
    q.clamp(0, 255) as u8
}

#[inline]
pub(crate) fn unquantize_sh(x: u8) -> f32 {
    (x as f32 - 128.0) / 128.0
}

#[inline]
pub(crate) fn sh_bucket(index_in_point: usize) -> i32 {
    if index_in_point < SH_DEGREE1_FLOATS {
        SH_BUCKET_DEGREE1
    } else {
        SH_BUCKET_REST
    }
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[inline]
pub(crate) fn inv_sigmoid(x: f32) -> f32 {
    (x / (1.0 - x)).ln()
}

#[inline]
pub(crate) fn quantize_alpha(a: f32) -> u8 {
    clamp_u8(sigmoid(a) * 255.0)
}

/// Half a quantization step away from 0 and 1 keeps the logit finite.
#[inline]
pub(crate) fn unquantize_alpha(a: u8) -> f32 {
    let eps = 0.5 / 255.0;
    inv_sigmoid((a as f32 / 255.0).clamp(eps, 1.0 - eps))
}

#[inline]
pub(crate) fn quantize_color(c: f32) -> u8 {
    clamp_u8(c * (COLOR_SCALE * 255.0) + 127.5)
}

#[inline]
pub(crate) fn unquantize_color(c: u8) -> f32 {
    (c as f32 / 255.0 - 0.5) / COLOR_SCALE
}

#[inline]
pub(crate) fn quantize_scale(s: f32) -> u8 {
    clamp_u8((s + SCALE_OFFSET) * SCALE_FACTOR)
}

#[inline]
pub(crate) fn unquantize_scale(s: u8) -> f32 {
    s as f32 / SCALE_FACTOR - SCALE_OFFSET
}

/// Number of SH coefficients (per color channel) for a degree.
#[inline]
pub fn dim_for_degree(deg: u8) -> usize {
    match deg {
        0 => 0,
        1 => 3,
        2 => 8,
        3 => 15,
        _ => 0,
    }
}

/// Largest degree whose coefficient count fits in `dim`.
#[inline]
pub const fn degree_for_dim(dim: usize) -> u8 {
    if dim < 3 {
        0
    } else if dim < 8 {
        1
    } else if dim < 15 {
        2
    } else {
        3
    }
}

#[inline]
pub(crate) fn half_to_float(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

/// True when `val` lies outside the 24-bit fixed-point range and would be
/// clamped by [`pack_fixed24`].
#[inline]
pub(crate) fn fixed24_saturates(val: f32, fractional_bits: u8) -> bool {
    let fixed = (val * (1i32 << fractional_bits) as f32).round();
    !(POSITION_FIXED_MIN as f32..=POSITION_FIXED_MAX as f32).contains(&fixed)
}

#[inline]
pub(crate) fn pack_fixed24(val: f32, fractional_bits: u8) -> [u8; 3] {
    let sf = (1i32 << fractional_bits) as f32;
    let fixed = ((val * sf).round() as i32).clamp(POSITION_FIXED_MIN, POSITION_FIXED_MAX);
    [
        (fixed & 0xFF) as u8,
        ((fixed >> 8) & 0xFF) as u8,
        ((fixed >> 16) & 0xFF) as u8,
    ]
}

#[inline]
pub(crate) fn unpack_fixed24(bytes: &[u8], fractional_bits: u8) -> f32 {
    let b0 = bytes[0] as u32;
    let b1 = bytes[1] as u32;
    let b2 = bytes[2] as u32;
    let mut fixed = b0 | (b1 << 8) | (b2 << 16);
    if (fixed & 0x0080_0000) != 0 {
        fixed |= 0xFF00_0000; // Sign extend
    }
    fixed as i32 as f32 / ((1u32 << fractional_bits) as f32)
}

pub(crate) type Quat = (f32, f32, f32, f32);

/// Normalizes `(x, y, z, w)`; a degenerate quaternion becomes the identity.
#[inline]
pub(crate) fn normalize_quat(q: Quat) -> Quat {
    let norm = (q.0 * q.0 + q.1 * q.1 + q.2 * q.2 + q.3 * q.3).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return (0.0, 0.0, 0.0, 1.0);
    }
    (q.0 / norm, q.1 / norm, q.2 / norm, q.3 / norm)
}

#[inline]
pub(crate) const fn times_quat(a: Quat, s: f32) -> Quat {
    ((a.0 * s), (a.1 * s), (a.2 * s), (a.3 * s))
}

#[inline]
pub(crate) const fn plus_quat(a: Quat, b: Quat) -> Quat {
    ((a.0 + b.0), (a.1 + b.1), (a.2 + b.2), (a.3 + b.3))
}

/// Stores x, y, z of a quaternion whose w has been made non-negative. When
/// w is zero the first non-zero of x, y, z is made positive instead, so `q`
/// and `-q` always pack to the same bytes.
#[inline]
pub(crate) fn pack_quat_first_three(q: Quat) -> [u8; 3] {
    let mut q = normalize_quat(q);
    let negate = [q.3, q.0, q.1, q.2]
        .into_iter()
        .find(|&c| c != 0.0)
        .is_some_and(|c| c < 0.0);
    let scale = if negate {
        -ROTATION_FIRST_THREE_SCALE
    } else {
        ROTATION_FIRST_THREE_SCALE
    };
    q = times_quat(q, scale);
    q = plus_quat(q, (127.5, 127.5, 127.5, 127.5));
    [clamp_u8(q.0), clamp_u8(q.1), clamp_u8(q.2)]
}

#[inline]
pub(crate) fn unpack_quat_first_three(bytes: &[u8]) -> Quat {
    let rotation_scale = 1.0 / ROTATION_FIRST_THREE_SCALE;
    let x = bytes[0] as f32 * rotation_scale - 1.0;
    let y = bytes[1] as f32 * rotation_scale - 1.0;
    let z = bytes[2] as f32 * rotation_scale - 1.0;
    let rr = 1.0 - (x * x + y * y + z * z);
    let w = if rr < 0.0 { 0.0 } else { rr.sqrt() };
    (x, y, z, w)
}

/// Packs the three smallest components into 10 bits each (sign + 9-bit
/// magnitude) with the index of the dropped largest component in the top
/// two bits. The largest component is made positive first, so `q` and `-q`
/// produce the same word.
#[inline]
pub(crate) fn pack_quat_smallest_three(q: Quat) -> [u8; 4] {
    let q = normalize_quat(q);
    let comps = [q.0, q.1, q.2, q.3];
    let mut largest = 0usize;
    for i in 1..4 {
        if comps[i].abs() > comps[largest].abs() {
            largest = i;
        }
    }
    let negate = comps[largest] < 0.0;

    let mut packed = largest as u32;
    for (i, &c) in comps.iter().enumerate() {
        if i == largest {
            continue;
        }
        let negbit = ((c < 0.0) ^ negate) as u32;
        let ratio = c.abs() / std::f32::consts::FRAC_1_SQRT_2;
        let mag = (ROTATION_SMALLEST_THREE_MAX as f32 * ratio + 0.5).floor() as u32;
        let mag = mag.min(ROTATION_SMALLEST_THREE_MAX);
        packed = (packed << 10) | (negbit << 9) | mag;
    }
    packed.to_le_bytes()
}

#[inline]
pub(crate) fn unpack_quat_smallest_three(bytes: &[u8]) -> Quat {
    let mut packed = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let largest = (packed >> 30) as usize;
    let mut comps = [0.0f32; 4];
    let mut sum_squares = 0.0;
    for i in (0..4).rev() {
        if i == largest {
            continue;
        }
        let mag = packed & ROTATION_SMALLEST_THREE_MAX;
        let negbit = (packed >> 9) & 0x1;
        packed >>= 10;
        let mut c =
            std::f32::consts::FRAC_1_SQRT_2 * mag as f32 / ROTATION_SMALLEST_THREE_MAX as f32;
        if negbit == 1 {
            c = -c;
        }
        sum_squares += c * c;
        comps[i] = c;
    }
    comps[largest] = (1.0 - sum_squares).max(0.0).sqrt();
    (comps[0], comps[1], comps[2], comps[3])
}
