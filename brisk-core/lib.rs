pub mod error;
pub mod image;
pub mod sampling;

pub use error::{ConfigError, ConfigResult, ImageError, ImageResult};
pub use image::{GrayImage, IntegralImage};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Diameter in pixels of the canonical sampling pattern at unit scale.
pub const BASIC_SIZE: f32 = 12.0;

/// Multiplier applied to the detection threshold for candidate extraction.
pub const SAFETY_FACTOR: f32 = 1.0;

/// Upper bound on configurable octaves.
pub const MAX_OCTAVES: usize = 8;

/// Key-point with sub-pixel position in source image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the support region in pixels
    pub size: f32,
    /// Orientation in degrees, [`Keypoint::UNSET_ANGLE`] if not estimated
    pub angle: f32,
    pub response: f32,
    /// Index of the pyramid layer the keypoint was found on
    pub layer: usize,
}

impl Keypoint {
    pub const UNSET_ANGLE: f32 = -1.0;

    pub fn new(x: f32, y: f32, size: f32, response: f32, layer: usize) -> Self {
        Self {
            x,
            y,
            size,
            angle: Self::UNSET_ANGLE,
            response,
            layer,
        }
    }

    pub fn has_angle(&self) -> bool {
        self.angle != Self::UNSET_ANGLE
    }
}

/// Concentric sampling rings: `radii[k]` carries `counts[k]` evenly spaced points.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RingGeometry {
    pub radii: Vec<f32>,
    pub counts: Vec<usize>,
}

impl RingGeometry {
    /// Centre point plus four rings, 60 points in total.
    pub fn standard(pattern_scale: f32) -> Self {
        let f = 0.85 * pattern_scale;
        Self {
            radii: vec![0.0, f * 2.9, f * 4.9, f * 7.4, f * 10.8],
            counts: vec![1, 10, 14, 15, 20],
        }
    }

    pub fn num_points(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.radii.len() != self.counts.len() {
            return Err(ConfigError::RingMismatch {
                radii: self.radii.len(),
                counts: self.counts.len(),
            });
        }
        if let Some(&r) = self.radii.iter().find(|r| !(r.is_finite() && **r >= 0.0)) {
            return Err(ConfigError::InvalidRingRadius(r));
        }
        if self.num_points() < 2 {
            return Err(ConfigError::EmptyPattern);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BriskConfig {
    /// Corner score a keypoint must exceed
    pub threshold: f32,
    /// Number of octaves; 0 detects on the source image only
    pub octaves: usize,
    pub rotation_invariant: bool,
    pub scale_invariant: bool,
    pub pattern_scale: f32,
    /// Custom ring geometry; the standard pattern when absent
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub pattern: Option<RingGeometry>,
    /// Pairs closer than this form descriptor bits (default `5.85 * pattern_scale`)
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub short_pair_max_dist: Option<f32>,
    /// Pairs farther than this vote for orientation (default `8.2 * pattern_scale`)
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub long_pair_min_dist: Option<f32>,
    /// Slot of every short pair in the descriptor
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub short_pair_permutation: Option<Vec<usize>>,
    pub n_threads: usize,
}

impl Default for BriskConfig {
    fn default() -> Self {
        Self {
            threshold: 60.0,
            octaves: 4,
            rotation_invariant: true,
            scale_invariant: true,
            pattern_scale: 1.0,
            pattern: None,
            short_pair_max_dist: None,
            long_pair_min_dist: None,
            short_pair_permutation: None,
            n_threads: num_cpus::get().max(1),
        }
    }
}

impl BriskConfig {
    /// Ring geometry in effect: the override or the standard pattern.
    pub fn geometry(&self) -> RingGeometry {
        self.pattern
            .clone()
            .unwrap_or_else(|| RingGeometry::standard(self.pattern_scale))
    }

    pub fn short_pair_max_dist(&self) -> f32 {
        self.short_pair_max_dist.unwrap_or(5.85 * self.pattern_scale)
    }

    pub fn long_pair_min_dist(&self) -> f32 {
        self.long_pair_min_dist.unwrap_or(8.2 * self.pattern_scale)
    }

    /// Threshold used to pull candidates from the corner oracle.
    pub fn safe_threshold(&self) -> u8 {
        (self.threshold * SAFETY_FACTOR).clamp(1.0, 255.0) as u8
    }

    /// Number of pyramid layers implied by `octaves`.
    pub fn num_layers(&self) -> usize {
        if self.octaves == 0 { 1 } else { 2 * self.octaves }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0 && self.threshold <= 255.0) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.octaves > MAX_OCTAVES {
            return Err(ConfigError::TooManyOctaves {
                octaves: self.octaves,
                max: MAX_OCTAVES,
            });
        }
        if !(self.pattern_scale.is_finite() && self.pattern_scale > 0.0) {
            return Err(ConfigError::InvalidPatternScale(self.pattern_scale));
        }
        for (name, value) in [
            ("short", self.short_pair_max_dist()),
            ("long", self.long_pair_min_dist()),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidPairDistance { name, value });
            }
        }
        if self.n_threads == 0 {
            return Err(ConfigError::InvalidThreadCount);
        }
        self.geometry().validate()
    }
}

/// Build a dedicated Rayon thread pool with the specified number of threads
pub fn build_thread_pool(n_threads: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("brisk-worker-{i}"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = BriskConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.num_layers(), 8);
        assert_eq!(cfg.safe_threshold(), 60);
        assert_eq!(cfg.geometry().num_points(), 60);
    }

    #[test]
    fn test_single_layer_when_no_octaves() {
        let cfg = BriskConfig { octaves: 0, ..BriskConfig::default() };
        assert_eq!(cfg.num_layers(), 1);
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let base = BriskConfig::default();

        let cfg = BriskConfig { threshold: 0.0, ..base.clone() };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidThreshold(_))));

        let cfg = BriskConfig { threshold: f32::NAN, ..base.clone() };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidThreshold(_))));

        let cfg = BriskConfig { octaves: 9, ..base.clone() };
        assert!(matches!(cfg.validate(), Err(ConfigError::TooManyOctaves { .. })));

        let cfg = BriskConfig { pattern_scale: -1.0, ..base.clone() };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPatternScale(_))));

        let cfg = BriskConfig { short_pair_max_dist: Some(0.0), ..base.clone() };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPairDistance { .. })));

        let cfg = BriskConfig { n_threads: 0, ..base.clone() };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidThreadCount)));

        let cfg = BriskConfig {
            pattern: Some(RingGeometry { radii: vec![1.0, 2.0], counts: vec![4] }),
            ..base
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::RingMismatch { .. })));
    }

    #[test]
    fn test_pair_distances_follow_pattern_scale() {
        let cfg = BriskConfig { pattern_scale: 2.0, ..BriskConfig::default() };
        approx::assert_relative_eq!(cfg.short_pair_max_dist(), 11.7, epsilon = 1e-4);
        approx::assert_relative_eq!(cfg.long_pair_min_dist(), 16.4, epsilon = 1e-4);
    }

    #[test]
    fn test_keypoint_angle_unset_by_default() {
        let kp = Keypoint::new(1.0, 2.0, 12.0, 80.0, 0);
        assert!(!kp.has_angle());
    }

    #[test]
    fn test_build_thread_pool() {
        let pool = build_thread_pool(2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }
}
