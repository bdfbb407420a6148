use brisk_core::{ConfigError, ImageError};
use brisk_descriptor::DescriptorError;
use brisk_detect::DetectError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BriskError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Detection failed: {0}")]
    Detect(#[from] DetectError),

    #[error("Description failed: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "serde")]
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[cfg(feature = "serde")]
    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Unknown preset `{0}`")]
    UnknownPreset(String),

    #[error("{0} needs the `serde` feature")]
    SerdeDisabled(&'static str),
}

pub type BriskResult<T> = Result<T, BriskError>;
