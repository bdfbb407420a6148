use std::convert::Infallible;
use std::sync::atomic::{AtomicU16, Ordering};

use brisk_core::{sampling, GrayImage};
use log::debug;
use rayon::prelude::*;

use crate::corner_detection::CornerScorer;
use crate::error::{DetectError, DetectResult};
use crate::types::{LayerInfo, LayerKind};

/// Cache slot that has not been scored yet
const UNSCORED: u16 = u16::MAX;

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(v) => v,
        Err(never) => match never {},
    }
}

/// One layer of the scale space: a resampled image, its placement in source
/// coordinates and a lazily filled cache of raw corner scores.
pub struct ScaleSpaceLayer {
    image: GrayImage,
    index: usize,
    scale: f32,
    offset: f32,
    scores: Vec<AtomicU16>,
}

impl ScaleSpaceLayer {
    pub fn new(image: GrayImage, index: usize, scale: f32) -> Self {
        let scores = (0..image.width() * image.height())
            .map(|_| AtomicU16::new(UNSCORED))
            .collect();
        Self {
            image,
            index,
            scale,
            offset: 0.5 * scale - 0.5,
            scores,
        }
    }

    fn half_sample(&self, index: usize) -> Self {
        let (w, h) = self.image.dimensions();
        let image = resample(&self.image, w / 2, h / 2, 2.0);
        Self::new(image, index, self.scale * 2.0)
    }

    fn two_thirds_sample(&self, index: usize) -> Self {
        let (w, h) = self.image.dimensions();
        let image = resample(&self.image, 2 * (w / 3), 2 * (h / 3), 1.5);
        Self::new(image, index, self.scale * 1.5)
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn width(&self) -> usize {
        self.image.width()
    }

    pub fn height(&self) -> usize {
        self.image.height()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> LayerKind {
        LayerKind::of_index(self.index)
    }

    /// Size of one layer pixel in source pixels.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn info(&self) -> LayerInfo {
        LayerInfo {
            index: self.index,
            kind: self.kind(),
            width: self.width(),
            height: self.height(),
            scale: self.scale,
            offset: self.offset,
        }
    }

    /// Maps layer coordinates to source image coordinates.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.offset, y * self.scale + self.offset)
    }

    /// Candidates for this layer from `scorer`.
    pub fn detect_candidates(&self, scorer: &dyn CornerScorer, threshold: u8) -> Vec<(usize, usize)> {
        scorer.detect_candidates(&self.image, threshold)
    }

    /// Cached corner score at integer `(x, y)`, 0 outside the layer or when
    /// below `threshold`.
    pub fn score(&self, scorer: &dyn CornerScorer, x: i64, y: i64, threshold: u8) -> u8 {
        let (w, h) = self.image.dimensions();
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            return 0;
        }
        let (x, y) = (x as usize, y as usize);
        let slot = &self.scores[y * w + x];
        let raw = match slot.load(Ordering::Relaxed) {
            UNSCORED => {
                let raw = scorer.score(&self.image, x, y, 0);
                slot.store(raw as u16, Ordering::Relaxed);
                raw
            }
            cached => cached as u8,
        };
        if raw >= threshold {
            raw
        } else {
            0
        }
    }

    /// Corner score at a sub-pixel position.
    ///
    /// `radius <= 1` blends the four surrounding scores bilinearly (truncated);
    /// larger radii average the cached scores over a `radius`-wide window.
    pub fn score_at(&self, scorer: &dyn CornerScorer, xf: f32, yf: f32, threshold: u8, radius: f32) -> u8 {
        if radius <= 1.0 {
            let x = xf as i64;
            let y = yf as i64;
            let rx1 = xf - x as f32;
            let rx = 1.0 - rx1;
            let ry1 = yf - y as f32;
            let ry = 1.0 - ry1;
            let s = |x: i64, y: i64| self.score(scorer, x, y, threshold) as f32;
            return (rx * ry * s(x, y)
                + rx1 * ry * s(x + 1, y)
                + rx * ry1 * s(x, y + 1)
                + rx1 * ry1 * s(x + 1, y + 1)) as u8;
        }

        let value = infallible(sampling::smoothed_fixed(xf, yf, radius / 2.0, |x, y| {
            Ok(self.score(scorer, x, y, threshold) as i64)
        }));
        ((value + sampling::SUBPIXEL_STEPS / 2) / sampling::SUBPIXEL_STEPS).clamp(0, 255) as u8
    }

    /// 3x3 smoothed score with weights 4 (centre), 2 (edges) and 1 (corners).
    pub fn smoothed_score(&self, scorer: &dyn CornerScorer, x: i64, y: i64, threshold: u8) -> i32 {
        4 * self.score(scorer, x, y, threshold) as i32 + self.ring_sum(scorer, x, y, threshold)
    }

    /// Weighted sum of the eight neighbours: 2 for edge, 1 for corner neighbours.
    pub fn ring_sum(&self, scorer: &dyn CornerScorer, x: i64, y: i64, threshold: u8) -> i32 {
        let s = |dx: i64, dy: i64| self.score(scorer, x + dx, y + dy, threshold) as i32;
        2 * (s(-1, 0) + s(1, 0) + s(0, -1) + s(0, 1)) + s(-1, -1) + s(1, -1) + s(-1, 1) + s(1, 1)
    }

    /// Raw scores of the 3x3 patch centred on `(x, y)`; `patch[i][j]` is
    /// the score at `(x + i - 1, y + j - 1)`.
    pub fn patch(&self, scorer: &dyn CornerScorer, x: i64, y: i64) -> [[i32; 3]; 3] {
        let mut patch = [[0i32; 3]; 3];
        for (i, column) in patch.iter_mut().enumerate() {
            for (j, cell) in column.iter_mut().enumerate() {
                *cell = self.score(scorer, x + i as i64 - 1, y + j as i64 - 1, 0) as i32;
            }
        }
        patch
    }
}

/// Layer stack of octaves and intra-octaves built from a source image
pub struct ScaleSpace {
    layers: Vec<ScaleSpaceLayer>,
}

impl ScaleSpace {
    /// Builds `2 * octaves` layers, or only the source layer when `octaves` is 0.
    pub fn new(image: GrayImage, octaves: usize) -> Self {
        let num_layers = if octaves == 0 { 1 } else { 2 * octaves };
        let mut layers = Vec::with_capacity(num_layers);
        layers.push(ScaleSpaceLayer::new(image, 0, 1.0));
        if num_layers > 1 {
            layers.push(layers[0].two_thirds_sample(1));
        }
        for i in 2..num_layers {
            let next = layers[i - 2].half_sample(i);
            layers.push(next);
        }

        for layer in &layers {
            debug!(
                "scale space layer {} ({:?}): {}x{}, scale {:.3}, offset {:.3}",
                layer.index(),
                layer.kind(),
                layer.width(),
                layer.height(),
                layer.scale(),
                layer.offset()
            );
        }
        Self { layers }
    }

    pub fn layers(&self) -> &[ScaleSpaceLayer] {
        &self.layers
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> DetectResult<&ScaleSpaceLayer> {
        self.layers.get(index).ok_or(DetectError::LayerOutOfRange {
            layer: index,
            layers: self.layers.len(),
        })
    }

    pub fn infos(&self) -> Vec<LayerInfo> {
        self.layers.iter().map(ScaleSpaceLayer::info).collect()
    }
}

/// Bilinear resampling with pixel-centre alignment: destination pixel `d`
/// reads the source at `(d + 0.5) * ratio - 0.5`, clamped to the image.
pub fn resample(src: &GrayImage, dst_width: usize, dst_height: usize, ratio: f32) -> GrayImage {
    let mut dst = GrayImage::new(dst_width, dst_height);
    if dst.is_empty() || src.is_empty() {
        return dst;
    }

    let max_x = (src.width() - 1) as f32;
    let max_y = (src.height() - 1) as f32;
    dst.as_mut_raw()
        .par_chunks_mut(dst_width)
        .enumerate()
        .for_each(|(y, row)| {
            let src_y = ((y as f32 + 0.5) * ratio - 0.5).clamp(0.0, max_y);
            for (x, out) in row.iter_mut().enumerate() {
                let src_x = ((x as f32 + 0.5) * ratio - 0.5).clamp(0.0, max_x);
                *out = (bilinear_sample(src, src_x, src_y) + 0.5) as u8;
            }
        });
    dst
}

/// Sample image at fractional in-bounds coordinates using bilinear interpolation
fn bilinear_sample(img: &GrayImage, x: f32, y: f32) -> f32 {
    let (width, height) = img.dimensions();
    let x1 = x.floor() as usize;
    let y1 = y.floor() as usize;
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);

    let fx = x - x1 as f32;
    let fy = y - y1 as f32;

    let p11 = img.get(x1, y1) as f32;
    let p12 = img.get(x2, y1) as f32;
    let p21 = img.get(x1, y2) as f32;
    let p22 = img.get(x2, y2) as f32;

    let interpolated_top = p11 * (1.0 - fx) + p12 * fx;
    let interpolated_bottom = p21 * (1.0 - fx) + p22 * fx;

    interpolated_top * (1.0 - fy) + interpolated_bottom * fy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corner_detection::Oast9_16;
    use approx::assert_relative_eq;

    fn create_test_image(w: usize, h: usize) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| ((x * 7 + y * 13) % 256) as u8)
    }

    fn create_dot_image() -> GrayImage {
        let mut img = GrayImage::from_fn(32, 32, |_, _| 10);
        img.as_mut_raw()[16 * 32 + 16] = 110;
        img
    }

    #[test]
    fn test_layer_sizes_and_scales() {
        let space = ScaleSpace::new(create_test_image(64, 64), 4);
        let sizes: Vec<_> = space.layers().iter().map(|l| l.width()).collect();
        assert_eq!(sizes, vec![64, 42, 32, 21, 16, 10, 8, 5]);

        let scales: Vec<_> = space.layers().iter().map(|l| l.scale()).collect();
        assert_eq!(scales, vec![1.0, 1.5, 2.0, 3.0, 4.0, 6.0, 8.0, 12.0]);
        assert!(scales.windows(2).all(|w| w[0] <= w[1]));

        for layer in space.layers() {
            assert_relative_eq!(layer.offset(), 0.5 * layer.scale() - 0.5);
        }
        assert_eq!(space.layers()[0].offset(), 0.0);
    }

    #[test]
    fn test_zero_octaves_is_single_layer() {
        let space = ScaleSpace::new(create_test_image(30, 20), 0);
        assert_eq!(space.num_layers(), 1);
        assert!(matches!(space.layer(1), Err(DetectError::LayerOutOfRange { layer: 1, layers: 1 })));
    }

    #[test]
    fn test_tiny_image_builds_empty_layers() {
        let space = ScaleSpace::new(create_test_image(4, 4), 3);
        assert_eq!(space.num_layers(), 6);
        assert!(space.layers().last().map(|l| l.image().is_empty()).unwrap_or(false));
    }

    #[test]
    fn test_half_sample_averages_pixel_pairs() {
        let src = GrayImage::from_fn(8, 4, |x, y| if (x / 2 + y / 2) % 2 == 0 { 10 } else { 30 });
        let dst = resample(&src, 4, 2, 2.0);
        for y in 0..2 {
            for x in 0..4 {
                assert_eq!(dst.get(x, y), src.get(2 * x, 2 * y));
            }
        }

        let ramp = GrayImage::from_fn(4, 2, |x, _| (x * 10) as u8);
        let half = resample(&ramp, 2, 1, 2.0);
        assert_eq!(half.get(0, 0), 5);
        assert_eq!(half.get(1, 0), 25);
    }

    #[test]
    fn test_resample_preserves_flat_image() {
        let src = GrayImage::from_fn(9, 9, |_, _| 77);
        let dst = resample(&src, 6, 6, 1.5);
        assert!(dst.as_raw().iter().all(|&p| p == 77));
    }

    #[test]
    fn test_score_cache_thresholds_on_read() {
        let space = ScaleSpace::new(create_dot_image(), 0);
        let layer = &space.layers()[0];
        let scorer = Oast9_16;

        assert_eq!(layer.score(&scorer, 16, 16, 120), 0);
        assert_eq!(layer.score(&scorer, 16, 16, 1), 99);
        assert_eq!(layer.score(&scorer, 16, 16, 120), 0);
        assert_eq!(layer.score(&scorer, 16, 16, 99), 99);
        assert_eq!(layer.score(&scorer, -1, 16, 1), 0);
        assert_eq!(layer.score(&scorer, 16, 40, 1), 0);
    }

    #[test]
    fn test_score_at_integer_position_matches_cache() {
        let space = ScaleSpace::new(create_dot_image(), 0);
        let layer = &space.layers()[0];
        let scorer = Oast9_16;
        assert_eq!(layer.score_at(&scorer, 16.0, 16.0, 1, 1.0), 99);
        let half = layer.score_at(&scorer, 16.5, 16.0, 1, 1.0);
        assert!(half <= 99 && half >= 40, "{half}");
    }

    #[test]
    fn test_score_at_wide_radius_averages() {
        let space = ScaleSpace::new(create_dot_image(), 0);
        let layer = &space.layers()[0];
        let scorer = Oast9_16;
        // Only the dot itself scores, so the result is 99 over the window area
        let narrow = layer.score_at(&scorer, 16.0, 16.0, 1, 2.0);
        assert!((24..=26).contains(&narrow), "{narrow}");
        let wide = layer.score_at(&scorer, 16.0, 16.0, 1, 4.0);
        assert!((5..=7).contains(&wide), "{wide}");
    }

    #[test]
    fn test_patch_and_smoothed_score() {
        let space = ScaleSpace::new(create_dot_image(), 0);
        let layer = &space.layers()[0];
        let scorer = Oast9_16;
        let patch = layer.patch(&scorer, 16, 16);
        assert_eq!(patch[1][1], 99);
        let ring = layer.ring_sum(&scorer, 16, 16, 1);
        assert_eq!(layer.smoothed_score(&scorer, 16, 16, 1), 4 * 99 + ring);
    }
}
