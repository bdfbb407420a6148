use brisk_core::{ConfigError, ImageError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Layer {layer} out of range (scale space has {layers} layers)")]
    LayerOutOfRange { layer: usize, layers: usize },
}

pub type DetectResult<T> = Result<T, DetectError>;
