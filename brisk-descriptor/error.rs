use brisk_core::{ConfigError, ImageError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptorError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Short-pair permutation has {len} entries but the pattern has {required} short pairs")]
    PermutationTooShort { len: usize, required: usize },

    #[error("Short-pair permutation maps pair {pair} to slot {slot}, which is out of range or already taken")]
    InvalidPermutation { pair: usize, slot: usize },

    #[error("Pattern has no short pairs; descriptors would be empty")]
    NoShortPairs,
}

pub type DescriptorResult<T> = Result<T, DescriptorError>;
