use thiserror::Error;

/// Errors raised when image buffers do not satisfy their layout contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("Invalid image dimensions: {width}x{height} (must be > 0)")]
    InvalidImageSize { width: usize, height: usize },

    #[error("Image data length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidImageData { expected_len: usize, actual_len: usize },

    #[error("Integral image is {integral_width}x{integral_height}, expected it to cover a {width}x{height} image")]
    IntegralMismatch {
        width: usize,
        height: usize,
        integral_width: usize,
        integral_height: usize,
    },

    #[error("Sample at ({x}, {y}) lies outside the {width}x{height} image")]
    OutOfBounds { x: i64, y: i64, width: usize, height: usize },
}

pub type ImageResult<T> = Result<T, ImageError>;

/// Pre-flight configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid threshold: {0} (must be finite and within (0, 255])")]
    InvalidThreshold(f32),

    #[error("Too many octaves: {octaves} (at most {max})")]
    TooManyOctaves { octaves: usize, max: usize },

    #[error("Invalid pattern scale: {0} (must be finite and > 0)")]
    InvalidPatternScale(f32),

    #[error("Invalid {name} pair distance: {value} (must be finite and > 0)")]
    InvalidPairDistance { name: &'static str, value: f32 },

    #[error("Pattern geometry has no sampling points")]
    EmptyPattern,

    #[error("Pattern geometry lists {radii} radii but {counts} point counts")]
    RingMismatch { radii: usize, counts: usize },

    #[error("Invalid ring radius {0} (must be finite and >= 0)")]
    InvalidRingRadius(f32),

    #[error("Thread count must be > 0")]
    InvalidThreadCount,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
