use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Result, SpzError};

pub const MAGIC: u32 = 0x5053474E; // 'NGSP'
pub const FLAG_ANTIALIASED: u8 = 0x1;
pub const HEADER_SIZE: usize = std::mem::size_of::<PackedGaussiansHeader>();

/// On-disk SPZ layout revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpzVersion {
    /// Float16 positions, first-three rotations. Read only.
    V1 = 1,
    /// 24-bit fixed-point positions, first-three rotations.
    V2 = 2,
    /// 24-bit fixed-point positions, smallest-three rotations.
    #[default]
    V3 = 3,
}

impl SpzVersion {
    pub fn from_u32(version: u32) -> Result<Self> {
        match version {
            1 => Ok(SpzVersion::V1),
            2 => Ok(SpzVersion::V2),
            3 => Ok(SpzVersion::V3),
            other => Err(SpzError::UnsupportedVersion(other)),
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn uses_float16(self) -> bool {
        self == SpzVersion::V1
    }

    pub fn uses_quat_smallest_three(self) -> bool {
        self == SpzVersion::V3
    }

    pub fn position_bytes(self) -> usize {
        if self.uses_float16() {
            6
        } else {
            9
        }
    }

    pub fn rotation_bytes(self) -> usize {
        if self.uses_quat_smallest_three() {
            4
        } else {
            3
        }
    }
}

/// Quantized attribute sections ready to be serialized.
#[derive(Debug, Clone)]
pub struct PackedGaussians {
    pub num_points: usize,
    pub sh_degree: u8,
    pub fractional_bits: u8,
    pub antialiased: bool,
    pub version: SpzVersion,
    pub positions: Vec<u8>,
    pub scales: Vec<u8>,
    pub rotations: Vec<u8>,
    pub alphas: Vec<u8>,
    pub colors: Vec<u8>,
    pub sh: Vec<u8>,
}

impl PackedGaussians {
    pub fn as_view(&self) -> PackedGaussiansView<'_> {
        PackedGaussiansView {
            num_points: self.num_points,
            sh_degree: self.sh_degree,
            fractional_bits: self.fractional_bits,
            antialiased: self.antialiased,
            version: self.version,
            positions: &self.positions,
            scales: &self.scales,
            rotations: &self.rotations,
            alphas: &self.alphas,
            colors: &self.colors,
            sh: &self.sh,
        }
    }
}

/// Quantized sections borrowed from a decompressed SPZ buffer.
#[derive(Debug, Clone)]
pub struct PackedGaussiansView<'a> {
    pub num_points: usize,
    pub sh_degree: u8,
    pub fractional_bits: u8,
    pub antialiased: bool,
    pub version: SpzVersion,
    pub positions: &'a [u8],
    pub scales: &'a [u8],
    pub rotations: &'a [u8],
    pub alphas: &'a [u8],
    pub colors: &'a [u8],
    pub sh: &'a [u8],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PackedGaussiansHeader {
    pub magic: U32,
    pub version: U32,
    pub num_points: U32,
    pub sh_degree: u8,
    pub fractional_bits: u8,
    pub flags: u8,
    pub reserved: u8,
}

impl PackedGaussiansHeader {
    pub fn new(packed: &PackedGaussians) -> Self {
        PackedGaussiansHeader {
            magic: U32::new(MAGIC),
            version: U32::new(packed.version.as_u32()),
            num_points: U32::new(packed.num_points as u32),
            sh_degree: packed.sh_degree,
            fractional_bits: packed.fractional_bits,
            flags: if packed.antialiased {
                FLAG_ANTIALIASED
            } else {
                0
            },
            reserved: 0,
        }
    }

    pub fn is_antialiased(&self) -> bool {
        (self.flags & FLAG_ANTIALIASED) != 0
    }
}
