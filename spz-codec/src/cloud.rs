use crate::common::dim_for_degree;
use crate::error::{Result, SpzError};

pub const MAX_SH_DEGREE: u8 = 3;

/// A flat Gaussian splat cloud.
///
/// Every per-point array is co-indexed: point `i` occupies slot `i` of each
/// array, scaled by that attribute's component count. Values use the 3DGS
/// training conventions:
///
/// * `scales` are log-scales,
/// * `rotations` are `(x, y, z, w)` quaternions,
/// * `alphas` are pre-sigmoid logits,
/// * `colors` are the DC spherical-harmonic coefficients,
/// * `sh` holds `sh_dim()` coefficients per point, each an RGB triple.
///
/// The default value (zero points) doubles as the "nothing loaded" sentinel.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GaussianCloud {
    pub num_points: usize,
    pub sh_degree: u8,
    pub antialiased: bool,
    pub positions: Vec<f32>,
    pub scales: Vec<f32>,
    pub rotations: Vec<f32>,
    pub alphas: Vec<f32>,
    pub colors: Vec<f32>,
    pub sh: Vec<f32>,
}

impl GaussianCloud {
    /// Allocates a zero-filled cloud with correctly sized arrays.
    pub fn with_capacity(num_points: usize, sh_degree: u8, antialiased: bool) -> Self {
        let sh_dim = dim_for_degree(sh_degree);
        GaussianCloud {
            num_points,
            sh_degree,
            antialiased,
            positions: vec![0.0; num_points * 3],
            scales: vec![0.0; num_points * 3],
            rotations: vec![0.0; num_points * 4],
            alphas: vec![0.0; num_points],
            colors: vec![0.0; num_points * 3],
            sh: vec![0.0; num_points * sh_dim * 3],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// SH coefficients per color channel.
    pub fn sh_dim(&self) -> usize {
        dim_for_degree(self.sh_degree)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sh_degree > MAX_SH_DEGREE {
            return Err(SpzError::UnsupportedShDegree(self.sh_degree));
        }
        if self.num_points == 0 {
            return Err(SpzError::EmptyCloud);
        }
        if self.num_points > u32::MAX as usize {
            return Err(SpzError::TooManyPoints(self.num_points));
        }

        let np = self.num_points;
        let expected = [
            ("positions", self.positions.len(), np * 3),
            ("scales", self.scales.len(), np * 3),
            ("rotations", self.rotations.len(), np * 4),
            ("alphas", self.alphas.len(), np),
            ("colors", self.colors.len(), np * 3),
            ("sh", self.sh.len(), np * self.sh_dim() * 3),
        ];
        for (attribute, actual, expected) in expected {
            if actual != expected {
                return Err(SpzError::InconsistentCloud {
                    attribute,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}
