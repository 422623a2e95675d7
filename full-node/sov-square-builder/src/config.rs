use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::namespace::NAMESPACE_ID_LEN;
use crate::shares::{INFO_LEN, RESERVED_LEN, SEQUENCE_LEN_BYTES};

/// Default size of a share, in bytes
pub const DEFAULT_SHARE_SIZE: usize = 128;
/// Default lower bound for the side length of the square
pub const DEFAULT_MIN_SQUARE_SIZE: usize = 2;
/// No square is smaller than 2x2, so that the evidence share and a transaction share fit together
pub const MIN_SQUARE_SIZE_FLOOR: usize = 2;
/// Default upper bound for the side length of the square
pub const DEFAULT_MAX_SQUARE_SIZE: usize = 128;

/// Protocol constants governing the geometry of the data square.
///
/// A single immutable value of this type is passed to every stage of square construction,
/// so that all validators agree on the layout as long as they agree on the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquareConfig {
    /// Bytes per share.
    pub share_size: usize,
    /// Smallest allowed side length. Must be a power of two, and at least 2.
    pub min_square_size: usize,
    /// Largest allowed side length. Must be a power of two.
    pub max_square_size: usize,
}

impl Default for SquareConfig {
    fn default() -> Self {
        Self {
            share_size: DEFAULT_SHARE_SIZE,
            min_square_size: DEFAULT_MIN_SQUARE_SIZE,
            max_square_size: DEFAULT_MAX_SQUARE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Square size bound {0} is not a power of two")]
    NotPowerOfTwo(usize),
    #[error("Minimum square size {0} is below {MIN_SQUARE_SIZE_FLOOR}")]
    MinSquareSizeTooSmall(usize),
    #[error("Minimum square size {min} exceeds maximum square size {max}")]
    InvertedBounds { min: usize, max: usize },
    #[error("Share size {0} is too small to hold share metadata")]
    ShareTooSmall(usize),
}

impl SquareConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for bound in [self.min_square_size, self.max_square_size] {
            if !bound.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo(bound));
            }
        }
        if self.min_square_size < MIN_SQUARE_SIZE_FLOOR {
            return Err(ConfigError::MinSquareSizeTooSmall(self.min_square_size));
        }
        if self.min_square_size > self.max_square_size {
            return Err(ConfigError::InvertedBounds {
                min: self.min_square_size,
                max: self.max_square_size,
            });
        }
        // The most expensive header is the first share of a compact sequence
        if self.share_size <= COMPACT_START_OVERHEAD {
            return Err(ConfigError::ShareTooSmall(self.share_size));
        }
        Ok(())
    }

    /// Every valid side length, smallest first
    pub fn square_sizes(&self) -> impl Iterator<Item = usize> {
        let max = self.max_square_size;
        std::iter::successors(Some(self.min_square_size), |size| size.checked_mul(2))
            .take_while(move |size| *size <= max)
    }

    /// The number of shares in the largest allowed square
    pub fn max_shares(&self) -> usize {
        self.max_square_size * self.max_square_size
    }

    /// Data bytes in the first share of a compact sequence
    pub fn compact_start_capacity(&self) -> usize {
        self.share_size - COMPACT_START_OVERHEAD
    }

    /// Data bytes in any later share of a compact sequence
    pub fn compact_continuation_capacity(&self) -> usize {
        self.share_size - COMPACT_START_OVERHEAD + SEQUENCE_LEN_BYTES
    }

    /// Data bytes in the first share of a message
    pub fn sparse_start_capacity(&self) -> usize {
        self.share_size - SPARSE_START_OVERHEAD
    }

    /// Data bytes in any later share of a message
    pub fn sparse_continuation_capacity(&self) -> usize {
        self.share_size - SPARSE_START_OVERHEAD + SEQUENCE_LEN_BYTES
    }
}

const SPARSE_START_OVERHEAD: usize = NAMESPACE_ID_LEN + INFO_LEN + SEQUENCE_LEN_BYTES;
const COMPACT_START_OVERHEAD: usize = SPARSE_START_OVERHEAD + RESERVED_LEN;

/// Reads toml file as a specific type.
pub fn from_toml_path<P: AsRef<Path>, R: DeserializeOwned>(path: P) -> anyhow::Result<R> {
    let mut contents = String::new();
    {
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
    }

    let result: R = toml::from_str(&contents)?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn create_config_from(content: &str) -> NamedTempFile {
        let mut config_file = NamedTempFile::new().unwrap();
        config_file.write_all(content.as_bytes()).unwrap();
        config_file
    }

    #[test]
    fn test_correct_config() {
        let config = r#"
            share_size = 256
            min_square_size = 4
            max_square_size = 64
        "#;

        let config_file = create_config_from(config);

        let config: SquareConfig = from_toml_path(config_file.path()).unwrap();
        let expected = SquareConfig {
            share_size: 256,
            min_square_size: 4,
            max_square_size: 64,
        };
        assert_eq!(config, expected);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config_file = create_config_from("max_square_size = 32\n");

        let config: SquareConfig = from_toml_path(config_file.path()).unwrap();
        assert_eq!(config.share_size, DEFAULT_SHARE_SIZE);
        assert_eq!(config.min_square_size, DEFAULT_MIN_SQUARE_SIZE);
        assert_eq!(config.max_square_size, 32);
    }

    #[test]
    fn test_invalid_configs() {
        let not_pow2 = SquareConfig {
            max_square_size: 100,
            ..Default::default()
        };
        assert_eq!(not_pow2.validate(), Err(ConfigError::NotPowerOfTwo(100)));

        let inverted = SquareConfig {
            min_square_size: 8,
            max_square_size: 4,
            ..Default::default()
        };
        assert_eq!(
            inverted.validate(),
            Err(ConfigError::InvertedBounds { min: 8, max: 4 })
        );

        let single_share = SquareConfig {
            min_square_size: 1,
            ..Default::default()
        };
        assert_eq!(
            single_share.validate(),
            Err(ConfigError::MinSquareSizeTooSmall(1))
        );

        let tiny = SquareConfig {
            share_size: 17,
            ..Default::default()
        };
        assert_eq!(tiny.validate(), Err(ConfigError::ShareTooSmall(17)));
    }

    #[test]
    fn test_square_sizes_and_capacities() {
        let config = SquareConfig::default();
        let sizes: Vec<usize> = config.square_sizes().collect();
        assert_eq!(sizes, vec![2, 4, 8, 16, 32, 64, 128]);
        assert_eq!(config.max_shares(), 16_384);

        assert_eq!(config.compact_start_capacity(), 111);
        assert_eq!(config.compact_continuation_capacity(), 115);
        assert_eq!(config.sparse_start_capacity(), 115);
        assert_eq!(config.sparse_continuation_capacity(), 119);
    }
}
