use brisk_core::BriskConfig;

use crate::builder::BriskBuilder;
use crate::error::BriskResult;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pipeline configuration with descriptive metadata
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorConfig {
    /// Detection and description parameters
    pub core: BriskConfig,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub version: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new(BriskConfig::default())
    }
}

impl DetectorConfig {
    /// Wrap a configuration without metadata
    pub fn new(core: BriskConfig) -> Self {
        Self {
            core,
            name: None,
            description: None,
            version: None,
        }
    }

    fn preset(core: BriskConfig, name: &str, description: &str) -> Self {
        Self::new(core).with_metadata(name, description)
    }

    /// Standard BRISK: threshold 60, four octaves, rotation and scale invariant
    pub fn default_preset() -> Self {
        Self::preset(
            BriskConfig::default(),
            "Default",
            "Rotation and scale invariant keypoints over four octaves",
        )
    }

    /// Fewer, stronger keypoints over three octaves
    pub fn fast_preset() -> Self {
        Self::preset(
            BriskConfig {
                threshold: 80.0,
                octaves: 3,
                ..BriskConfig::default()
            },
            "Fast",
            "Higher threshold and fewer octaves for real-time use",
        )
    }

    /// Descriptors sampled without orientation estimation
    pub fn upright_preset() -> Self {
        Self::preset(
            BriskConfig {
                rotation_invariant: false,
                ..BriskConfig::default()
            },
            "Upright",
            "Scale invariant only, for imagery without in-plane rotation",
        )
    }

    /// Detection on the source image only with a fixed descriptor scale
    pub fn single_scale_preset() -> Self {
        Self::preset(
            BriskConfig {
                octaves: 0,
                scale_invariant: false,
                ..BriskConfig::default()
            },
            "Single scale",
            "No pyramid; every keypoint is described at one scale",
        )
    }

    /// Low threshold for texture-poor images
    pub fn dense_preset() -> Self {
        Self::preset(
            BriskConfig {
                threshold: 30.0,
                ..BriskConfig::default()
            },
            "Dense",
            "Low corner threshold yielding many keypoints",
        )
    }

    /// Preset by name, accepting `-` or `_` separators
    pub fn preset_by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('-', "_").as_str() {
            "default" => Some(Self::default_preset()),
            "fast" => Some(Self::fast_preset()),
            "upright" => Some(Self::upright_preset()),
            "single_scale" => Some(Self::single_scale_preset()),
            "dense" => Some(Self::dense_preset()),
            _ => None,
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self.version = Some("1.0".to_string());
        self
    }

    /// Convert to BriskBuilder for further customization
    pub fn to_builder(self) -> BriskBuilder {
        BriskBuilder::from_config(self)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        let c = &self.core;
        format!(
            "{}: threshold={}, octaves={}, pattern_scale={}, threads={}, features=[Rotation:{}, Scale:{}, CustomPattern:{}]",
            self.name.as_deref().unwrap_or("DetectorConfig"),
            c.threshold,
            c.octaves,
            c.pattern_scale,
            c.n_threads,
            c.rotation_invariant,
            c.scale_invariant,
            c.pattern.is_some()
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> BriskResult<()> {
        self.core.validate()?;
        Ok(())
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> BriskResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> BriskResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> BriskResult<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> BriskResult<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Load from a `.json` or `.toml` file, by extension
    #[cfg(feature = "serde")]
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> BriskResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::load_json(path),
            _ => Self::load_toml(path),
        }
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> BriskResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> BriskResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> BriskResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> BriskResult<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BriskError;
    use brisk_core::ConfigError;

    #[test]
    fn test_presets_are_valid() {
        for preset in [
            DetectorConfig::default_preset(),
            DetectorConfig::fast_preset(),
            DetectorConfig::upright_preset(),
            DetectorConfig::single_scale_preset(),
            DetectorConfig::dense_preset(),
        ] {
            assert!(preset.validate().is_ok(), "{}", preset.summary());
            assert!(preset.name.is_some());
            assert_eq!(preset.version.as_deref(), Some("1.0"));
        }
    }

    #[test]
    fn test_preset_by_name() {
        assert_eq!(
            DetectorConfig::preset_by_name("single-scale"),
            Some(DetectorConfig::single_scale_preset())
        );
        assert_eq!(DetectorConfig::preset_by_name("FAST"), Some(DetectorConfig::fast_preset()));
        assert!(DetectorConfig::preset_by_name("quality").is_none());
    }

    #[test]
    fn test_summary_mentions_settings() {
        let summary = DetectorConfig::upright_preset().summary();
        assert!(summary.starts_with("Upright"));
        assert!(summary.contains("threshold=60"));
        assert!(summary.contains("Rotation:false"));
    }

    #[test]
    fn test_validate_reports_core_errors() {
        let mut config = DetectorConfig::default();
        config.core.octaves = 42;
        assert!(matches!(
            config.validate(),
            Err(BriskError::Config(ConfigError::TooManyOctaves { .. }))
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip_keeps_metadata() {
        let config = DetectorConfig::dense_preset();
        let restored = DetectorConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_round_trip_with_permutation() {
        let mut config = DetectorConfig::fast_preset();
        config.core.short_pair_max_dist = Some(6.0);
        config.core.short_pair_permutation = Some(vec![2, 0, 1]);
        let restored = DetectorConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = DetectorConfig::from_toml("name = \"mine\"\n\n[core]\nthreshold = 45.0\n").unwrap();
        assert_eq!(config.name.as_deref(), Some("mine"));
        assert_eq!(config.core.threshold, 45.0);
        assert_eq!(config.core.octaves, 4);
        assert!(config.core.rotation_invariant);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_loading_rejects_invalid_values() {
        let result = DetectorConfig::from_json(r#"{"core": {"threshold": 0.0}}"#);
        assert!(matches!(
            result,
            Err(BriskError::Config(ConfigError::InvalidThreshold(_)))
        ));
        assert!(matches!(
            DetectorConfig::from_json("{ not json"),
            Err(BriskError::Json(_))
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("brisk-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let json = dir.join("preset.json");
        let toml = dir.join("preset.toml");

        let config = DetectorConfig::upright_preset();
        config.save_json(&json).unwrap();
        config.save_toml(&toml).unwrap();
        assert_eq!(DetectorConfig::load(&json).unwrap(), config);
        assert_eq!(DetectorConfig::load(&toml).unwrap(), config);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
