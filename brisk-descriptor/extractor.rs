use brisk_core::{BriskConfig, GrayImage, IntegralImage, Keypoint};
use log::debug;
use rayon::prelude::*;

use crate::error::DescriptorResult;
use crate::pattern::{PatternTable, NUM_ROTATIONS};
use crate::sampler::smoothed_intensity;

/// Fixed-length binary descriptors, one row per keypoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Descriptors {
    rows: usize,
    row_bytes: usize,
    data: Vec<u8>,
}

impl Descriptors {
    fn zeroed(rows: usize, row_bytes: usize) -> Self {
        Self {
            rows,
            row_bytes,
            data: vec![0; rows * row_bytes],
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn row(&self, i: usize) -> Option<&[u8]> {
        (i < self.rows).then(|| &self.data[i * self.row_bytes..(i + 1) * self.row_bytes])
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u8]> {
        // chunks_exact panics on zero; an empty matrix has no rows either way
        self.data.chunks_exact(self.row_bytes.max(1))
    }

    /// Row-major bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// BRISK descriptor extractor over a precomputed pattern table
pub struct BriskExtractor {
    table: PatternTable,
    rotation_invariant: bool,
    scale_invariant: bool,
}

impl BriskExtractor {
    /// Build the pattern table described by `cfg`.
    pub fn new(cfg: &BriskConfig) -> DescriptorResult<Self> {
        let table = PatternTable::from_config(cfg)?;
        Ok(Self::with_table(table, cfg.rotation_invariant, cfg.scale_invariant))
    }

    pub fn with_table(table: PatternTable, rotation_invariant: bool, scale_invariant: bool) -> Self {
        Self {
            table,
            rotation_invariant,
            scale_invariant,
        }
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    pub fn descriptor_bytes(&self) -> usize {
        self.table.descriptor_bytes()
    }

    /// Describe `keypoints`, dropping those too close to the border.
    ///
    /// Returns the retained keypoints, in input order and with their angles
    /// set, alongside one descriptor row each.
    pub fn compute(
        &self,
        img: &GrayImage,
        keypoints: &[Keypoint],
    ) -> DescriptorResult<(Vec<Keypoint>, Descriptors)> {
        let integral = IntegralImage::new(img);
        self.compute_with_integral(img, &integral, keypoints)
    }

    /// Same as [`compute`](Self::compute) with a caller-provided integral image.
    pub fn compute_with_integral(
        &self,
        img: &GrayImage,
        integral: &IntegralImage,
        keypoints: &[Keypoint],
    ) -> DescriptorResult<(Vec<Keypoint>, Descriptors)> {
        integral.check_matches(img)?;

        let mut kept: Vec<(Keypoint, usize)> = keypoints
            .iter()
            .filter_map(|kp| {
                let scale = self.scale_of(kp);
                self.inside_border(img, kp, scale).then_some((*kp, scale))
            })
            .collect();
        debug!(
            "extraction: {} of {} keypoints inside the border",
            kept.len(),
            keypoints.len()
        );

        let bytes = self.table.descriptor_bytes();
        let mut descriptors = Descriptors::zeroed(kept.len(), bytes);
        if !kept.is_empty() {
            descriptors
                .data
                .par_chunks_mut(bytes)
                .zip(kept.par_iter_mut())
                .try_for_each(|(row, (kp, scale))| self.describe(img, integral, kp, *scale, row))?;
        }

        let keypoints = kept.into_iter().map(|(kp, _)| kp).collect();
        Ok((keypoints, descriptors))
    }

    fn scale_of(&self, kp: &Keypoint) -> usize {
        if self.scale_invariant {
            PatternTable::scale_bucket(kp.size)
        } else {
            PatternTable::upright_scale_bucket()
        }
    }

    fn inside_border(&self, img: &GrayImage, kp: &Keypoint, scale: usize) -> bool {
        let border = self.table.border(scale) as f32;
        let max_x = img.width() as f32 - border;
        let max_y = img.height() as f32 - border;
        kp.x >= border && kp.x < max_x && kp.y >= border && kp.y < max_y
    }

    /// Orientation, then one bit per short pair at the chosen rotation.
    fn describe(
        &self,
        img: &GrayImage,
        integral: &IntegralImage,
        kp: &mut Keypoint,
        scale: usize,
        row: &mut [u8],
    ) -> DescriptorResult<()> {
        let mut values = vec![0i64; self.table.num_points()];

        let rotation = if self.rotation_invariant {
            self.sample(img, integral, kp, scale, 0, &mut values)?;
            let angle = self.orientation(&values);
            kp.angle = angle;
            PatternTable::rotation_bucket(angle)
        } else if kp.has_angle() {
            kp.angle = normalize_degrees(kp.angle);
            PatternTable::rotation_bucket(kp.angle)
        } else {
            0
        };

        self.sample(img, integral, kp, scale, rotation, &mut values)?;
        for (k, pair) in self.table.short_pairs().iter().enumerate() {
            if values[pair.i] > values[pair.j] {
                row[k / 8] |= 1 << (k % 8);
            }
        }
        Ok(())
    }

    fn sample(
        &self,
        img: &GrayImage,
        integral: &IntegralImage,
        kp: &Keypoint,
        scale: usize,
        rotation: usize,
        values: &mut [i64],
    ) -> DescriptorResult<()> {
        debug_assert!(rotation < NUM_ROTATIONS);
        for (value, point) in values.iter_mut().zip(self.table.points(scale, rotation)) {
            *value = smoothed_intensity(img, integral, kp.x, kp.y, point)?;
        }
        Ok(())
    }

    /// Dominant gradient direction over the long pairs, in `[0, 360)` degrees.
    fn orientation(&self, values: &[i64]) -> f32 {
        let (mut gx, mut gy) = (0i64, 0i64);
        for pair in self.table.long_pairs() {
            let delta = values[pair.i] - values[pair.j];
            gx += delta * pair.weight_dx as i64 / 1024;
            gy += delta * pair.weight_dy as i64 / 1024;
        }
        normalize_degrees((gy as f32).atan2(gx as f32).to_degrees())
    }
}

fn normalize_degrees(angle: f32) -> f32 {
    let a = angle.rem_euclid(360.0);
    if a >= 360.0 { 0.0 } else { a }
}
