use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpzError>;

#[derive(Debug, Error)]
pub enum SpzError {
    #[error("Failed to parse PLY: {0}")]
    ParsePly(String),

    #[error("Missing required PLY property: {0}")]
    MissingProperty(String),

    #[error("Unsupported PLY layout: {0}")]
    UnsupportedPly(String),

    #[error("The Gaussian cloud is empty.")]
    EmptyCloud,

    #[error("Inconsistent Gaussian cloud: {attribute} has {actual} values, expected {expected}")]
    InconsistentCloud {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Too many points for SPZ: {0}")]
    TooManyPoints(usize),

    #[error("Unsupported SH degree: {0}, expected 0..=3")]
    UnsupportedShDegree(u8),

    #[error("Invalid SPZ magic number: {found:#010X}, expected {expected:#010X}")]
    BadMagic { found: u32, expected: u32 },

    #[error("Malformed SPZ header: {0}")]
    MalformedHeader(String),

    #[error("Unsupported SPZ version: {0}")]
    UnsupportedVersion(u32),

    #[error("Input is truncated, need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Compression failed: {0}")]
    Compress(String),

    #[error("Decompression failed: {0}")]
    Decompress(String),

    #[error("An I/O error occurred: {0}")]
    Io(#[from] io::Error),
}

impl SpzError {
    /// True for errors caused by the input bytes rather than the environment.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            SpzError::ParsePly(_)
                | SpzError::MissingProperty(_)
                | SpzError::UnsupportedPly(_)
                | SpzError::UnsupportedShDegree(_)
                | SpzError::BadMagic { .. }
                | SpzError::MalformedHeader(_)
                | SpzError::UnsupportedVersion(_)
                | SpzError::Truncated { .. }
                | SpzError::Decompress(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_problem() {
        let err = SpzError::Truncated {
            needed: 1016,
            available: 26,
        };
        assert_eq!(
            err.to_string(),
            "Input is truncated, need 1016 bytes, have 26"
        );

        let err = SpzError::BadMagic {
            found: 0xDEADBEEF,
            expected: 0x5053474E,
        };
        assert!(err.to_string().contains("0xDEADBEEF"));
    }

    #[test]
    fn test_malformed_input_classification() {
        assert!(SpzError::UnsupportedVersion(9).is_malformed_input());
        assert!(SpzError::MissingProperty("x".into()).is_malformed_input());
        assert!(!SpzError::EmptyCloud.is_malformed_input());
        assert!(!SpzError::Compress("boom".into()).is_malformed_input());
    }
}
