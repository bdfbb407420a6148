//! BRISK keypoint detection: corner scoring over a scale space of octaves and
//! intra-octaves, with sub-pixel and sub-scale refinement of the maxima.

// Module declarations
pub mod corner_detection;
pub mod detector;
pub mod error;
pub mod pyramid;
pub mod refinement;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use corner_detection::{Agast5_8, CornerScorer, Oast9_16};
pub use detector::BriskDetector;
pub use error::{DetectError, DetectResult};
pub use pyramid::{resample, ScaleSpace, ScaleSpaceLayer};
pub use refinement::{KeypointRefinement, ScaleFit, SubpixelFit};
pub use types::{LayerInfo, LayerKind};
