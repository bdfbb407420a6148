//! BRISK binary descriptors: a sampling pattern tabulated over discrete
//! scales and rotations, orientation from long-distance pairs and one bit per
//! short-distance pair.

pub mod error;
pub mod extractor;
pub mod pattern;
pub mod sampler;

pub use error::{DescriptorError, DescriptorResult};
pub use extractor::{BriskExtractor, Descriptors};
pub use pattern::{
    canonical_points, classify_pairs, LongPair, PairSet, PatternPoint, PatternTable, ShortPair,
    NUM_ROTATIONS, NUM_SCALES,
};
pub use sampler::smoothed_intensity;
