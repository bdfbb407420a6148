//! High-level BRISK pipeline: scale-space detection followed by binary
//! description, run on a dedicated thread pool.

pub mod builder;
pub mod config;
pub mod error;

use brisk_core::{build_thread_pool, BriskConfig, GrayImage, IntegralImage, Keypoint};
use brisk_descriptor::{BriskExtractor, Descriptors};
use brisk_detect::BriskDetector;
use log::debug;

pub use brisk_core::{self, BriskConfig as Config, GrayImage as BriskImage, Keypoint as BriskKeypoint};
pub use brisk_descriptor::{self, Descriptors as BriskDescriptors};
pub use brisk_detect;
pub use builder::BriskBuilder;
pub use config::DetectorConfig;
pub use error::{BriskError, BriskResult};

/// Keypoint detector and descriptor extractor sharing one configuration
pub struct Brisk {
    detector: BriskDetector,
    extractor: BriskExtractor,
    pool: rayon::ThreadPool,
}

impl Brisk {
    /// Validate `cfg`, start its thread pool and precompute the sampling pattern
    pub fn new(cfg: BriskConfig) -> BriskResult<Self> {
        cfg.validate()?;
        let pool = build_thread_pool(cfg.n_threads)?;
        let extractor = pool.install(|| BriskExtractor::new(&cfg))?;
        debug!(
            "pipeline ready: {} threads, {}-byte descriptors",
            cfg.n_threads,
            extractor.descriptor_bytes()
        );
        let detector = BriskDetector::new(cfg)?;
        Ok(Self {
            detector,
            extractor,
            pool,
        })
    }

    /// Detect keypoints in source image coordinates
    pub fn detect(&self, img: &GrayImage) -> BriskResult<Vec<Keypoint>> {
        Ok(self.pool.install(|| self.detector.detect(img))?)
    }

    /// Describe keypoints, dropping those too close to the border
    pub fn describe(&self, img: &GrayImage, keypoints: &[Keypoint]) -> BriskResult<(Vec<Keypoint>, Descriptors)> {
        Ok(self.pool.install(|| self.extractor.compute(img, keypoints))?)
    }

    /// Detect keypoints and generate descriptors in one step
    pub fn detect_and_describe(&self, img: &GrayImage) -> BriskResult<(Vec<Keypoint>, Descriptors)> {
        self.pool.install(|| -> BriskResult<_> {
            let keypoints = self.detector.detect(img)?;
            let integral = IntegralImage::new(img);
            Ok(self.extractor.compute_with_integral(img, &integral, &keypoints)?)
        })
    }

    /// Same as [`detect_and_describe`](Self::detect_and_describe) on a raw row-major buffer
    pub fn detect_and_describe_raw(
        &self,
        data: &[u8],
        width: usize,
        height: usize,
    ) -> BriskResult<(Vec<Keypoint>, Descriptors)> {
        let img = GrayImage::from_raw(width, height, data.to_vec())?;
        self.detect_and_describe(&img)
    }

    /// Get pipeline configuration
    pub fn config(&self) -> &BriskConfig {
        self.detector.config()
    }

    pub fn descriptor_bytes(&self) -> usize {
        self.extractor.descriptor_bytes()
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}
