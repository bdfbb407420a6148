use std::sync::Arc;

use brisk_core::{BriskConfig, GrayImage, Keypoint, BASIC_SIZE};
use log::{debug, trace};
use rayon::prelude::*;

use crate::corner_detection::{Agast5_8, CornerScorer, Oast9_16};
use crate::error::DetectResult;
use crate::pyramid::{ScaleSpace, ScaleSpaceLayer};
use crate::refinement::{KeypointRefinement, ScaleFit};
use crate::types::{LayerKind, LayerMaximum};

/// Why a candidate did not become a keypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    NotMax2d,
    NotMaxAcrossScales,
    WeakResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Neighbour {
    Above,
    Below,
}

/// Multi-scale BRISK keypoint detector
pub struct BriskDetector {
    cfg: BriskConfig,
    scorer: Arc<dyn CornerScorer>,
    base_scorer: Arc<dyn CornerScorer>,
}

impl BriskDetector {
    /// Creates a detector with the OAST 9-16 scorer and the AGAST 5-8
    /// scorer standing in for the layer below the source image
    pub fn new(cfg: BriskConfig) -> DetectResult<Self> {
        Self::with_scorers(cfg, Arc::new(Oast9_16), Arc::new(Agast5_8))
    }

    /// Creates a detector with custom corner scorers
    pub fn with_scorers(
        cfg: BriskConfig,
        scorer: Arc<dyn CornerScorer>,
        base_scorer: Arc<dyn CornerScorer>,
    ) -> DetectResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            scorer,
            base_scorer,
        })
    }

    /// Get detector configuration
    pub fn config(&self) -> &BriskConfig {
        &self.cfg
    }

    /// Builds the scale space this detector searches.
    pub fn build_scale_space(&self, img: &GrayImage) -> ScaleSpace {
        ScaleSpace::new(img.clone(), self.cfg.octaves)
    }

    /// Detect keypoints from a raw row-major buffer
    pub fn detect_raw(&self, data: &[u8], width: usize, height: usize) -> DetectResult<Vec<Keypoint>> {
        let img = GrayImage::from_raw(width, height, data.to_vec())?;
        self.detect(&img)
    }

    /// Detect keypoints in source image coordinates, ordered by layer and
    /// then by candidate position
    pub fn detect(&self, img: &GrayImage) -> DetectResult<Vec<Keypoint>> {
        let space = self.build_scale_space(img);
        Ok(self.detect_in(&space))
    }

    /// Detect keypoints in a prebuilt scale space
    pub fn detect_in(&self, space: &ScaleSpace) -> Vec<Keypoint> {
        let safe_threshold = self.cfg.safe_threshold();
        let per_layer: Vec<Vec<Keypoint>> = (0..space.num_layers())
            .into_par_iter()
            .map(|i| self.detect_layer(space, i, safe_threshold))
            .collect();

        let keypoints: Vec<Keypoint> = per_layer.into_iter().flatten().collect();
        debug!("detected {} keypoints over {} layers", keypoints.len(), space.num_layers());
        keypoints
    }

    fn detect_layer(&self, space: &ScaleSpace, layer: usize, safe_threshold: u8) -> Vec<Keypoint> {
        let this = &space.layers()[layer];
        let candidates = this.detect_candidates(self.scorer.as_ref(), safe_threshold);

        let outcomes: Vec<Result<Keypoint, Rejection>> = candidates
            .par_iter()
            .map(|&(x, y)| self.localize(space, layer, x as i64, y as i64, safe_threshold))
            .collect();

        let mut keypoints = Vec::with_capacity(outcomes.len());
        let (mut not_max_2d, mut not_max_3d, mut weak) = (0usize, 0usize, 0usize);
        for outcome in outcomes {
            match outcome {
                Ok(kp) => keypoints.push(kp),
                Err(Rejection::NotMax2d) => not_max_2d += 1,
                Err(Rejection::NotMaxAcrossScales) => not_max_3d += 1,
                Err(Rejection::WeakResponse) => weak += 1,
            }
        }

        debug!(
            "layer {layer}: {} candidates, {} keypoints",
            candidates.len(),
            keypoints.len()
        );
        trace!(
            "layer {layer}: rejected {not_max_2d} as not 2-D maxima, {not_max_3d} across scales, {weak} below threshold"
        );
        keypoints
    }

    fn localize(
        &self,
        space: &ScaleSpace,
        layer: usize,
        x: i64,
        y: i64,
        safe_threshold: u8,
    ) -> Result<Keypoint, Rejection> {
        if !self.is_max_2d(&space.layers()[layer], x, y, safe_threshold) {
            return Err(Rejection::NotMax2d);
        }

        let num_layers = space.num_layers();
        let kp = if num_layers == 1 {
            let this = &space.layers()[0];
            let fit = KeypointRefinement::subpixel_2d(&this.patch(self.scorer.as_ref(), x, y));
            Keypoint::new(x as f32 + fit.dx, y as f32 + fit.dy, BASIC_SIZE, fit.score, 0)
        } else if layer == num_layers - 1 {
            let this = &space.layers()[layer];
            let centre = this.score(self.scorer.as_ref(), x, y, safe_threshold);
            // no layer above to interpolate against: the layer below only gates
            self.score_max(space, layer, x, y, centre, Neighbour::Below)
                .ok_or(Rejection::NotMaxAcrossScales)?;
            let fit = KeypointRefinement::subpixel_2d(&this.patch(self.scorer.as_ref(), x, y));
            let (sx, sy) = this.to_source(x as f32 + fit.dx, y as f32 + fit.dy);
            Keypoint::new(sx, sy, BASIC_SIZE * this.scale(), fit.score, layer)
        } else {
            let (sx, sy, scale, score) =
                self.refine_3d(space, layer, x, y).ok_or(Rejection::NotMaxAcrossScales)?;
            Keypoint::new(sx, sy, BASIC_SIZE * scale, score, layer)
        };

        if kp.response > self.cfg.threshold {
            Ok(kp)
        } else {
            Err(Rejection::WeakResponse)
        }
    }

    /// Whether `(x, y)` is a maximum of the thresholded scores of its layer.
    /// Neighbours with an equal score win when their 3x3 smoothed score is
    /// strictly larger.
    fn is_max_2d(&self, layer: &ScaleSpaceLayer, x: i64, y: i64, threshold: u8) -> bool {
        let scorer = self.scorer.as_ref();
        let centre = layer.score(scorer, x, y, threshold);
        let mut ties = [(0i64, 0i64); 8];
        let mut num_ties = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let s = layer.score(scorer, x + dx, y + dy, threshold);
                if centre < s {
                    return false;
                }
                if centre == s {
                    ties[num_ties] = (dx, dy);
                    num_ties += 1;
                }
            }
        }
        if num_ties == 0 {
            return true;
        }

        let smoothed_centre = layer.smoothed_score(scorer, x, y, threshold);
        ties[..num_ties]
            .iter()
            .all(|&(dx, dy)| layer.smoothed_score(scorer, x + dx, y + dy, threshold) <= smoothed_centre)
    }

    /// Scans the layer above or below for the maximum score over the area
    /// covered by pixel `(x, y)` of `layer`.
    ///
    /// Returns `None` when any sample outside the last row exceeds
    /// `threshold`, i.e. the candidate is not a maximum across scales.
    fn score_max(
        &self,
        space: &ScaleSpace,
        layer: usize,
        x: i64,
        y: i64,
        threshold: u8,
        direction: Neighbour,
    ) -> Option<LayerMaximum> {
        let scorer = self.scorer.as_ref();
        let this = &space.layers()[layer];
        let other = match direction {
            Neighbour::Above => space.layers().get(layer + 1)?,
            Neighbour::Below => space.layers().get(layer.checked_sub(1)?)?,
        };
        let kind = LayerKind::of_index(layer);

        // window in the other layer's coordinates
        let window = |v: i64| -> (f32, f32) {
            let v = v as f32;
            match (direction, kind) {
                (Neighbour::Above, LayerKind::Octave) => ((4.0 * v - 3.0) / 6.0, (4.0 * v + 1.0) / 6.0),
                (Neighbour::Above, LayerKind::Intra) => ((6.0 * v - 4.0) / 8.0, (6.0 * v + 2.0) / 8.0),
                (Neighbour::Below, LayerKind::Octave) => ((8.0 * v - 3.0) / 6.0, (8.0 * v + 5.0) / 6.0),
                (Neighbour::Below, LayerKind::Intra) => ((6.0 * v - 2.0) / 4.0, (6.0 * v + 4.0) / 4.0),
            }
        };
        // other layer coordinate back into this layer
        let map_back = |r: f32| -> f32 {
            match (direction, kind) {
                (Neighbour::Above, LayerKind::Octave) => (6.0 * r + 1.0) / 4.0,
                (Neighbour::Above, LayerKind::Intra) => (8.0 * r + 1.0) / 6.0,
                (Neighbour::Below, LayerKind::Octave) => (6.0 * r + 1.0) / 8.0,
                (Neighbour::Below, LayerKind::Intra) => (4.0 * r - 1.0) / 6.0,
            }
        };

        let (x_1, x1) = window(x);
        let (y_1, y1) = window(y);
        let (xi_1, xi1) = (x_1 as i64, x1 as i64);
        let (yi_1, yi1) = (y_1 as i64, y1 as i64);
        let t = threshold as f32;

        let lookup = |xf: f32, yf: f32| other.score_at(scorer, xf, yf, 1, 1.0) as f32;
        let cell = |cx: i64, cy: i64| other.score(scorer, cx, cy, 1);
        // equal scores below only count as larger when their neighbourhood is stronger
        let loses_tie = |cx: i64, cy: i64| {
            direction == Neighbour::Below
                && other.ring_sum(scorer, cx, cy, 1) > this.ring_sum(scorer, x, y, 1)
        };

        let mut max_x = xi_1 + 1;
        let mut max_y = yi_1 + 1;

        // first row
        let mut maxval = lookup(x_1, y_1);
        if maxval > t {
            return None;
        }
        for cx in xi_1 + 1..=xi1 {
            let v = lookup(cx as f32, y_1);
            if v > t {
                return None;
            }
            if v > maxval {
                maxval = v;
                max_x = cx;
            }
        }
        let v = lookup(x1, y_1);
        if v > t {
            return None;
        }
        if v > maxval {
            maxval = v;
            max_x = xi1;
        }

        // middle rows
        for cy in yi_1 + 1..=yi1 {
            let v = lookup(x_1, cy as f32);
            if v > t {
                return None;
            }
            if v > maxval {
                maxval = v;
                max_x = (x_1 + 1.0) as i64;
                max_y = cy;
            }
            for cx in xi_1 + 1..=xi1 {
                let s = cell(cx, cy);
                if s > threshold || (s == threshold && loses_tie(cx, cy)) {
                    return None;
                }
                let v = s as f32;
                if v > maxval {
                    maxval = v;
                    max_x = cx;
                    max_y = cy;
                }
            }
            let v = lookup(x1, cy as f32);
            if v > t {
                return None;
            }
            if v > maxval {
                maxval = v;
                max_x = (x1 + 1.0) as i64;
                max_y = cy;
            }
        }

        // last row only competes for the maximum
        let v = lookup(x_1, y1);
        if v > maxval {
            maxval = v;
            max_x = (x_1 + 1.0) as i64;
            max_y = yi1;
        }
        for cx in xi_1 + 1..=xi1 {
            let v = lookup(cx as f32, y1);
            if v > maxval {
                maxval = v;
                max_x = cx;
                max_y = yi1;
            }
        }
        let v = lookup(x1, y1);
        if v > maxval {
            maxval = v;
            max_x = (x1 + 1.0) as i64;
            max_y = yi1;
        }

        let fit = KeypointRefinement::subpixel_2d(&other.patch(scorer, max_x, max_y));
        let dx = map_back(max_x as f32 + fit.dx) - x as f32;
        let dy = map_back(max_y as f32 + fit.dy) - y as f32;

        if (-1.0..=1.0).contains(&dx) && (-1.0..=1.0).contains(&dy) {
            Some(LayerMaximum {
                score: fit.score.max(maxval),
                dx,
                dy,
            })
        } else {
            Some(LayerMaximum {
                score: maxval,
                dx: dx.clamp(-1.0, 1.0),
                dy: dy.clamp(-1.0, 1.0),
            })
        }
    }

    /// Raw AGAST 5-8 patch on the source layer, standing in for the missing
    /// layer below it.
    fn base_patch(&self, layer: &ScaleSpaceLayer, x: i64, y: i64) -> [[i32; 3]; 3] {
        let img = layer.image();
        let mut patch = [[0i32; 3]; 3];
        for (i, column) in patch.iter_mut().enumerate() {
            for (j, cell) in column.iter_mut().enumerate() {
                let cx = x + i as i64 - 1;
                let cy = y + j as i64 - 1;
                if cx >= 0 && cy >= 0 {
                    *cell = self.base_scorer.score(img, cx as usize, cy as usize, 1) as i32;
                }
            }
        }
        patch
    }

    /// Refines a candidate of an inner layer in position and scale against
    /// both neighbouring layers. Returns source position, absolute scale and
    /// refined score.
    fn refine_3d(&self, space: &ScaleSpace, layer: usize, x: i64, y: i64) -> Option<(f32, f32, f32, f32)> {
        let scorer = self.scorer.as_ref();
        let this = &space.layers()[layer];
        let centre = this.score(scorer, x, y, 1);

        let above = self.score_max(space, layer, x, y, centre, Neighbour::Above)?;
        let below = if layer == 0 {
            let patch = self.base_patch(this, x, y);
            let max = patch.iter().flatten().copied().max().unwrap_or(0);
            let fit = KeypointRefinement::subpixel_2d(&patch);
            LayerMaximum {
                score: max as f32,
                dx: fit.dx,
                dy: fit.dy,
            }
        } else {
            self.score_max(space, layer, x, y, centre, Neighbour::Below)?
        };

        let fit = KeypointRefinement::subpixel_2d(&this.patch(scorer, x, y));
        let centre_score = (centre as f32).max(fit.score);

        let scale_fit = match (this.kind(), layer) {
            (LayerKind::Octave, 0) => ScaleFit::Base,
            (LayerKind::Octave, _) => ScaleFit::Octave,
            (LayerKind::Intra, _) => ScaleFit::Intra,
        };
        let (scale, score) = KeypointRefinement::refine_1d(scale_fit, below.score, centre_score, above.score);

        // weight of this layer's offset against the neighbour it leans towards
        let (r0, other) = match scale_fit {
            ScaleFit::Octave | ScaleFit::Base if scale > 1.0 => ((1.5 - scale) / 0.5, above),
            ScaleFit::Base => ((scale - 0.5) / 0.5, below),
            ScaleFit::Octave => ((scale - 0.75) / 0.25, below),
            ScaleFit::Intra if scale > 1.0 => (4.0 - 3.0 * scale, above),
            ScaleFit::Intra => (3.0 * scale - 2.0, below),
        };
        let r1 = 1.0 - r0;
        let lx = r0 * fit.dx + r1 * other.dx + x as f32;
        let ly = r0 * fit.dy + r1 * other.dy + y as f32;
        let (sx, sy) = this.to_source(lx, ly);

        Some((sx, sy, scale * this.scale(), score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> BriskConfig {
        BriskConfig {
            threshold: 30.0,
            octaves: 3,
            n_threads: 2,
            ..BriskConfig::default()
        }
    }

    fn create_square_image(size: usize, x0: usize, side: usize) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if x >= x0 && x < x0 + side && y >= x0 && y < x0 + side {
                220
            } else {
                30
            }
        })
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let cfg = BriskConfig { threshold: -3.0, ..create_test_config() };
        assert!(BriskDetector::new(cfg).is_err());
    }

    #[test]
    fn test_detect_raw_validates_length() {
        let detector = BriskDetector::new(create_test_config()).unwrap();
        assert!(detector.detect_raw(&[0u8; 10], 4, 4).is_err());
        assert!(detector.detect_raw(&[0u8; 16], 4, 4).unwrap().is_empty());
    }

    #[test]
    fn test_flat_images_yield_nothing() {
        let detector = BriskDetector::new(create_test_config()).unwrap();
        for value in [0u8, 128, 255] {
            let img = GrayImage::from_fn(64, 64, |_, _| value);
            assert!(detector.detect(&img).unwrap().is_empty());
        }
    }

    #[test]
    fn test_square_corners_are_detected() {
        let detector = BriskDetector::new(create_test_config()).unwrap();
        let img = create_square_image(96, 32, 32);
        let keypoints = detector.detect(&img).unwrap();
        assert!(!keypoints.is_empty());
        for kp in &keypoints {
            assert!(kp.response > 30.0);
            assert!(kp.size >= BASIC_SIZE * 0.5);
            assert!(!kp.has_angle());
            assert!(kp.x > 16.0 && kp.x < 80.0 && kp.y > 16.0 && kp.y < 80.0, "{kp:?}");
        }
        // every corner of the square attracts a keypoint
        for (cx, cy) in [(32.0, 32.0), (63.0, 32.0), (32.0, 63.0), (63.0, 63.0)] {
            assert!(
                keypoints.iter().any(|kp: &Keypoint| (kp.x - cx).abs() < 6.0 && (kp.y - cy).abs() < 6.0),
                "no keypoint near ({cx}, {cy})"
            );
        }
    }

    #[test]
    fn test_single_layer_keeps_unit_size() {
        let cfg = BriskConfig { octaves: 0, ..create_test_config() };
        let detector = BriskDetector::new(cfg).unwrap();
        let keypoints = detector.detect(&create_square_image(64, 20, 24)).unwrap();
        assert!(!keypoints.is_empty());
        for kp in &keypoints {
            assert_eq!(kp.layer, 0);
            assert_eq!(kp.size, BASIC_SIZE);
        }
    }

    #[test]
    fn test_detection_is_deterministic() {
        let img = create_square_image(96, 30, 36);
        let a = BriskDetector::new(create_test_config()).unwrap().detect(&img).unwrap();
        let pool = brisk_core::build_thread_pool(1).unwrap();
        let b = pool.install(|| BriskDetector::new(create_test_config()).unwrap().detect(&img).unwrap());
        assert_eq!(a, b);
    }

    fn create_bar_image(xs: std::ops::RangeInclusive<usize>) -> GrayImage {
        GrayImage::from_fn(32, 32, |x, y| if y == 16 && xs.contains(&x) { 110 } else { 10 })
    }

    #[test]
    fn test_equal_neighbours_are_both_maxima() {
        let detector = BriskDetector::new(create_test_config()).unwrap();
        let space = ScaleSpace::new(create_bar_image(16..=17), 0);
        let layer = &space.layers()[0];
        let scorer = detector.scorer.as_ref();
        assert!(layer.score(scorer, 16, 16, 1) > 0);
        assert_eq!(layer.score(scorer, 16, 16, 1), layer.score(scorer, 17, 16, 1));
        assert!(detector.is_max_2d(layer, 16, 16, 1));
        assert!(detector.is_max_2d(layer, 17, 16, 1));
    }

    #[test]
    fn test_tie_goes_to_stronger_neighbourhood() {
        let detector = BriskDetector::new(create_test_config()).unwrap();
        let space = ScaleSpace::new(create_bar_image(15..=17), 0);
        let layer = &space.layers()[0];
        let scorer = detector.scorer.as_ref();
        assert_eq!(layer.score(scorer, 15, 16, 1), layer.score(scorer, 16, 16, 1));
        assert!(detector.is_max_2d(layer, 16, 16, 1));
        assert!(!detector.is_max_2d(layer, 15, 16, 1));
        assert!(!detector.is_max_2d(layer, 17, 16, 1));
        assert!(!detector.is_max_2d(layer, 16, 17, 1));
    }

    /// Square with soft edges so corners also score on coarser layers
    fn create_soft_square_image() -> GrayImage {
        GrayImage::from_fn(96, 96, |x, y| {
            let ramp = |v: usize| ((v as f32 - 31.5).min(64.5 - v as f32) / 4.0).clamp(0.0, 1.0);
            (30.0 + 190.0 * ramp(x) * ramp(y)) as u8
        })
    }

    #[test]
    fn test_top_layer_position_comes_from_its_own_fit() {
        let images = [create_square_image(96, 32, 32), create_soft_square_image()];
        for octaves in [1, 2] {
            let cfg = BriskConfig { octaves, ..create_test_config() };
            let detector = BriskDetector::new(cfg).unwrap();
            let safe_threshold = detector.cfg.safe_threshold();
            for img in &images {
                let space = detector.build_scale_space(img);
                let top = space.num_layers() - 1;
                let layer = &space.layers()[top];
                for (x, y) in layer.detect_candidates(detector.scorer.as_ref(), safe_threshold) {
                    let (x, y) = (x as i64, y as i64);
                    let Ok(kp) = detector.localize(&space, top, x, y, safe_threshold) else {
                        continue;
                    };
                    let fit = KeypointRefinement::subpixel_2d(&layer.patch(detector.scorer.as_ref(), x, y));
                    let (sx, sy) = layer.to_source(x as f32 + fit.dx, y as f32 + fit.dy);
                    assert_eq!((kp.x, kp.y), (sx, sy));
                    assert_eq!(kp.layer, top);
                    assert_eq!(kp.size, BASIC_SIZE * layer.scale());
                }
            }
        }
    }

    #[test]
    fn test_layers_are_ordered() {
        let detector = BriskDetector::new(create_test_config()).unwrap();
        let keypoints = detector.detect(&create_square_image(96, 32, 32)).unwrap();
        assert!(keypoints.windows(2).all(|w| w[0].layer <= w[1].layer));
    }
}
