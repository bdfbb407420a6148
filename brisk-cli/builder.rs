use brisk_core::{BriskConfig, RingGeometry};

use crate::Brisk;
use crate::config::DetectorConfig;
use crate::error::BriskResult;

/// Builder for creating a [`Brisk`] pipeline
#[derive(Debug, Clone, Default)]
pub struct BriskBuilder {
    config: BriskConfig,
}

impl BriskBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the corner score a keypoint must exceed
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the number of octaves (0 = source image only)
    pub fn octaves(mut self, octaves: usize) -> Self {
        self.config.octaves = octaves;
        self
    }

    /// Scale the sampling pattern and its pair distances
    pub fn pattern_scale(mut self, pattern_scale: f32) -> Self {
        self.config.pattern_scale = pattern_scale;
        self
    }

    /// Enable or disable orientation estimation
    pub fn rotation_invariant(mut self, enable: bool) -> Self {
        self.config.rotation_invariant = enable;
        self
    }

    /// Enable or disable per-keypoint descriptor scale
    pub fn scale_invariant(mut self, enable: bool) -> Self {
        self.config.scale_invariant = enable;
        self
    }

    /// Replace the standard rings with a custom geometry
    pub fn pattern(mut self, radii: Vec<f32>, counts: Vec<usize>) -> Self {
        self.config.pattern = Some(RingGeometry { radii, counts });
        self
    }

    /// Override the short- and long-pair distance limits
    pub fn pair_distances(mut self, short_max: f32, long_min: f32) -> Self {
        self.config.short_pair_max_dist = Some(short_max);
        self.config.long_pair_min_dist = Some(long_min);
        self
    }

    /// Set the descriptor slot of every short pair
    pub fn short_pair_permutation(mut self, permutation: Vec<usize>) -> Self {
        self.config.short_pair_permutation = Some(permutation);
        self
    }

    /// Set the number of threads for parallel processing
    pub fn threads(mut self, n_threads: usize) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    fn apply_preset(mut self, preset: DetectorConfig) -> Self {
        let n_threads = self.config.n_threads;
        self.config = BriskConfig {
            n_threads,
            ..preset.core
        };
        self
    }

    /// Apply the fast preset
    pub fn preset_fast(self) -> Self {
        self.apply_preset(DetectorConfig::fast_preset())
    }

    /// Apply the upright preset
    pub fn preset_upright(self) -> Self {
        self.apply_preset(DetectorConfig::upright_preset())
    }

    /// Apply the single-scale preset
    pub fn preset_single_scale(self) -> Self {
        self.apply_preset(DetectorConfig::single_scale_preset())
    }

    /// Apply the dense preset
    pub fn preset_dense(self) -> Self {
        self.apply_preset(DetectorConfig::dense_preset())
    }

    /// Build the pipeline, validating the configuration and precomputing the pattern
    pub fn build(self) -> BriskResult<Brisk> {
        Brisk::new(self.config)
    }

    /// Generate summary of current configuration
    pub fn summary(&self) -> String {
        format!(
            "BriskBuilder: threshold={}, octaves={}, pattern_scale={}, threads={}, features=[Rotation:{}, Scale:{}], pairs=[short<{:.2}, long>{:.2}]",
            self.config.threshold,
            self.config.octaves,
            self.config.pattern_scale,
            self.config.n_threads,
            self.config.rotation_invariant,
            self.config.scale_invariant,
            self.config.short_pair_max_dist(),
            self.config.long_pair_min_dist()
        )
    }

    /// Create builder from existing configuration
    pub fn from_config(config: DetectorConfig) -> Self {
        Self { config: config.core }
    }

    /// Convert to DetectorConfig
    pub fn to_config(self) -> DetectorConfig {
        DetectorConfig::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let config = BriskBuilder::new()
            .threshold(42.0)
            .octaves(2)
            .pattern_scale(1.5)
            .rotation_invariant(false)
            .threads(3)
            .to_config();
        assert_eq!(config.core.threshold, 42.0);
        assert_eq!(config.core.octaves, 2);
        assert_eq!(config.core.pattern_scale, 1.5);
        assert!(!config.core.rotation_invariant);
        assert!(config.core.scale_invariant);
        assert_eq!(config.core.n_threads, 3);
    }

    #[test]
    fn test_preset_keeps_thread_count() {
        let config = BriskBuilder::new().threads(2).preset_single_scale().to_config();
        assert_eq!(config.core.n_threads, 2);
        assert_eq!(config.core.octaves, 0);
        assert!(!config.core.scale_invariant);
    }

    #[test]
    fn test_config_round_trip_through_builder() {
        let preset = DetectorConfig::dense_preset();
        let config = preset.clone().to_builder().to_config();
        assert_eq!(config.core, preset.core);
        assert!(config.name.is_none());
    }

    #[test]
    fn test_summary_shows_pair_distances() {
        let summary = BriskBuilder::new().pattern_scale(2.0).summary();
        assert!(summary.contains("short<11.70"));
        assert!(summary.contains("long>16.40"));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        assert!(BriskBuilder::new().threads(0).build().is_err());
        assert!(BriskBuilder::new().pattern(vec![0.0, 3.0], vec![1]).build().is_err());
        assert!(BriskBuilder::new().short_pair_permutation(vec![0, 0]).build().is_err());
    }
}
