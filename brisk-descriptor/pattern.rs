//! Precomputed BRISK sampling pattern.
//!
//! The pattern is a set of concentric rings of sampling points, each point
//! carrying the smoothing sigma used when it is read. It is tabulated once
//! for every discrete scale and rotation. Point pairs of the canonical
//! pattern are split into short pairs (one descriptor bit each) and long
//! pairs (orientation votes).

use brisk_core::{BriskConfig, RingGeometry, BASIC_SIZE};
use log::debug;
use rayon::prelude::*;

use crate::error::{DescriptorError, DescriptorResult};

/// Discrete scales covering the scale range.
pub const NUM_SCALES: usize = 64;
/// Ratio between the largest and smallest tabulated scale.
pub const SCALE_RANGE: f32 = 30.0;
/// Discrete rotations over a full turn.
pub const NUM_ROTATIONS: usize = 1024;

const SIGMA_SCALE: f64 = 1.3;
/// Fraction of the basic size that maps to scale index 0
const BASIC_SIZE_FRACTION: f32 = 0.6;
/// Keypoint size standing in for every keypoint without scale invariance
const UPRIGHT_SIZE_FACTOR: f32 = 1.45;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternPoint {
    pub x: f32,
    pub y: f32,
    pub sigma: f32,
}

/// Descriptor bit `I(i) > I(j)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortPair {
    pub i: usize,
    pub j: usize,
}

/// Orientation vote with fixed-point inverse-distance weights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongPair {
    pub i: usize,
    pub j: usize,
    pub weight_dx: i32,
    pub weight_dy: i32,
}

/// Short and long pairs of the canonical pattern
#[derive(Debug, Clone, PartialEq)]
pub struct PairSet {
    pub short: Vec<ShortPair>,
    pub long: Vec<LongPair>,
    pub dropped: usize,
}

/// Classifies every pair `(i, j)`, `j < i`, of the canonical points.
///
/// Short pair `k` (in discovery order) is stored at `permutation[k]`.
pub fn classify_pairs(
    points: &[PatternPoint],
    d_max: f32,
    d_min: f32,
    permutation: Option<&[usize]>,
) -> DescriptorResult<PairSet> {
    let d_min_sq = d_min * d_min;
    let d_max_sq = d_max * d_max;

    let mut short = Vec::new();
    let mut long = Vec::new();
    let mut dropped = 0;
    for i in 1..points.len() {
        for j in 0..i {
            let dx = points[j].x - points[i].x;
            let dy = points[j].y - points[i].y;
            let norm_sq = dx * dx + dy * dy;
            if norm_sq > d_min_sq {
                long.push(LongPair {
                    i,
                    j,
                    weight_dx: (dx / norm_sq * 2048.0).round() as i32,
                    weight_dy: (dy / norm_sq * 2048.0).round() as i32,
                });
            } else if norm_sq < d_max_sq {
                short.push(ShortPair { i, j });
            } else {
                dropped += 1;
            }
        }
    }

    if short.is_empty() {
        return Err(DescriptorError::NoShortPairs);
    }
    if let Some(permutation) = permutation {
        short = permute(short, permutation)?;
    }
    Ok(PairSet { short, long, dropped })
}

fn permute(pairs: Vec<ShortPair>, permutation: &[usize]) -> DescriptorResult<Vec<ShortPair>> {
    if permutation.len() < pairs.len() {
        return Err(DescriptorError::PermutationTooShort {
            len: permutation.len(),
            required: pairs.len(),
        });
    }
    let mut slots: Vec<Option<ShortPair>> = vec![None; pairs.len()];
    for (pair, (&slot, short)) in permutation.iter().zip(pairs).enumerate() {
        match slots.get_mut(slot) {
            Some(entry) if entry.is_none() => *entry = Some(short),
            _ => return Err(DescriptorError::InvalidPermutation { pair, slot }),
        }
    }
    // all slots are filled: n distinct in-range slots for n pairs
    Ok(slots.into_iter().flatten().collect())
}

/// Canonical pattern points at unit scale and zero rotation.
pub fn canonical_points(geometry: &RingGeometry) -> Vec<PatternPoint> {
    let mut points = Vec::with_capacity(geometry.num_points());
    push_rotated_points(&mut points, geometry, 1.0, 0.0);
    points
}

fn push_rotated_points(out: &mut Vec<PatternPoint>, geometry: &RingGeometry, scale: f64, theta: f64) {
    for (ring, (&radius, &count)) in geometry.radii.iter().zip(&geometry.counts).enumerate() {
        let radius = radius as f64;
        let sigma = if ring == 0 {
            SIGMA_SCALE * scale * 0.5
        } else {
            SIGMA_SCALE * scale * radius * (std::f64::consts::PI / count as f64).sin()
        };
        for n in 0..count {
            let alpha = n as f64 * 2.0 * std::f64::consts::PI / count as f64;
            out.push(PatternPoint {
                x: (scale * radius * (alpha + theta).cos()) as f32,
                y: (scale * radius * (alpha + theta).sin()) as f32,
                sigma: sigma as f32,
            });
        }
    }
}

/// Sampling pattern at every discrete scale and rotation with its pairings
pub struct PatternTable {
    num_points: usize,
    /// Indexed `scale * NUM_ROTATIONS * num_points + rotation * num_points + point`
    points: Vec<PatternPoint>,
    scale_list: Vec<f32>,
    size_list: Vec<usize>,
    pairs: PairSet,
}

impl PatternTable {
    pub fn new(
        geometry: &RingGeometry,
        d_max: f32,
        d_min: f32,
        permutation: Option<&[usize]>,
    ) -> DescriptorResult<Self> {
        geometry.validate()?;
        let num_points = geometry.num_points();
        let lb_scale_step = (SCALE_RANGE as f64).log2() / NUM_SCALES as f64;
        let scale_list: Vec<f32> = (0..NUM_SCALES)
            .map(|s| 2f64.powf(s as f64 * lb_scale_step) as f32)
            .collect();

        let per_scale = NUM_ROTATIONS * num_points;
        let mut points = vec![PatternPoint { x: 0.0, y: 0.0, sigma: 0.0 }; NUM_SCALES * per_scale];
        points
            .par_chunks_mut(per_scale)
            .zip(&scale_list)
            .for_each(|(chunk, &scale)| {
                let mut buf = Vec::with_capacity(num_points);
                for (rot, out) in chunk.chunks_mut(num_points).enumerate() {
                    let theta = rot as f64 * 2.0 * std::f64::consts::PI / NUM_ROTATIONS as f64;
                    buf.clear();
                    push_rotated_points(&mut buf, geometry, scale as f64, theta);
                    out.copy_from_slice(&buf);
                }
            });

        let size_list = scale_list
            .iter()
            .enumerate()
            .map(|(s, &scale)| {
                points[s * per_scale..s * per_scale + num_points]
                    .iter()
                    .zip(ring_radii(geometry))
                    .map(|(p, radius)| (scale * radius + p.sigma).ceil() as usize + 1)
                    .max()
                    .unwrap_or(1)
            })
            .collect();

        let pairs = classify_pairs(&points[..num_points], d_max, d_min, permutation)?;
        debug!(
            "pattern: {} points, {} short pairs, {} long pairs, {} dropped, {} descriptor bytes",
            num_points,
            pairs.short.len(),
            pairs.long.len(),
            pairs.dropped,
            Self::bytes_for(pairs.short.len())
        );

        Ok(Self {
            num_points,
            points,
            scale_list,
            size_list,
            pairs,
        })
    }

    /// Table for the geometry, pair distances and permutation in `cfg`.
    pub fn from_config(cfg: &BriskConfig) -> DescriptorResult<Self> {
        cfg.validate()?;
        Self::new(
            &cfg.geometry(),
            cfg.short_pair_max_dist(),
            cfg.long_pair_min_dist(),
            cfg.short_pair_permutation.as_deref(),
        )
    }

    fn bytes_for(num_short: usize) -> usize {
        num_short.div_ceil(128) * 16
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Pattern points at a scale and rotation index.
    pub fn points(&self, scale: usize, rotation: usize) -> &[PatternPoint] {
        let start = (scale * NUM_ROTATIONS + rotation) * self.num_points;
        &self.points[start..start + self.num_points]
    }

    pub fn short_pairs(&self) -> &[ShortPair] {
        &self.pairs.short
    }

    pub fn long_pairs(&self) -> &[LongPair] {
        &self.pairs.long
    }

    pub fn dropped_pairs(&self) -> usize {
        self.pairs.dropped
    }

    /// Bytes per descriptor, whole 128-bit blocks.
    pub fn descriptor_bytes(&self) -> usize {
        Self::bytes_for(self.pairs.short.len())
    }

    pub fn scale_factor(&self, scale: usize) -> f32 {
        self.scale_list[scale]
    }

    /// Distance from the image edge a keypoint at this scale index needs.
    pub fn border(&self, scale: usize) -> usize {
        self.size_list[scale]
    }

    /// Scale index for a keypoint diameter, saturated to the table.
    pub fn scale_bucket(size: f32) -> usize {
        let lb_range = SCALE_RANGE.log2();
        let bucket = NUM_SCALES as f32 / lb_range * (size / (BASIC_SIZE * BASIC_SIZE_FRACTION)).log2() + 0.5;
        (bucket.max(0.0) as usize).min(NUM_SCALES - 1)
    }

    /// Scale index shared by every keypoint when scale invariance is off.
    pub fn upright_scale_bucket() -> usize {
        Self::scale_bucket(UPRIGHT_SIZE_FACTOR * BASIC_SIZE)
    }

    /// Rotation index for an angle in degrees, wrapped into the table.
    pub fn rotation_bucket(angle: f32) -> usize {
        let angle = angle.rem_euclid(360.0);
        let theta = (NUM_ROTATIONS as f32 * (angle / 360.0) + 0.5) as usize;
        theta % NUM_ROTATIONS
    }
}

/// Radius of the ring every point belongs to, in point order.
fn ring_radii(geometry: &RingGeometry) -> impl Iterator<Item = f32> + '_ {
    geometry
        .radii
        .iter()
        .zip(&geometry.counts)
        .flat_map(|(&r, &n)| std::iter::repeat_n(r, n))
}
