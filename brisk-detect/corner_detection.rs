use brisk_core::GrayImage;
use rayon::prelude::*;

use crate::utils::{best_arc_minimum, has_consecutive_bits, ring_mask};

/// Per-pixel corner response used by the scale space.
///
/// `score` must be deterministic: the scale space caches it per pixel and may
/// evaluate the same pixel from several threads.
pub trait CornerScorer: Send + Sync {
    /// Pixels closer than this to any edge always score 0.
    fn margin(&self) -> usize;

    /// Corner score at `(x, y)`, or 0 when the score is below `threshold` or
    /// the pixel lies inside the margin.
    fn score(&self, img: &GrayImage, x: usize, y: usize, threshold: u8) -> u8;

    /// Pixels scoring at least `threshold` that are not below any of their
    /// eight neighbours, in row-major order.
    fn detect_candidates(&self, img: &GrayImage, threshold: u8) -> Vec<(usize, usize)> {
        let (w, h) = img.dimensions();
        let m = self.margin();
        if w <= 2 * m || h <= 2 * m {
            return Vec::new();
        }

        let mut scores = vec![0u8; w * h];
        scores
            .par_chunks_mut(w)
            .enumerate()
            .skip(m)
            .take(h - 2 * m)
            .for_each(|(y, row)| {
                for x in m..w - m {
                    row[x] = self.score(img, x, y, threshold);
                }
            });

        (m..h - m)
            .into_par_iter()
            .flat_map_iter(|y| {
                let scores = &scores;
                (m..w - m).filter_map(move |x| {
                    let s = scores[y * w + x];
                    if s == 0 || s < threshold {
                        return None;
                    }
                    let is_peak = NEIGHBOURS.iter().all(|&(dx, dy)| {
                        let nx = (x as isize + dx) as usize;
                        let ny = (y as isize + dy) as usize;
                        scores[ny * w + nx] <= s
                    });
                    is_peak.then_some((x, y))
                })
            })
            .collect()
    }
}

const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1), (0, -1), (1, -1),
    (-1, 0), (1, 0),
    (-1, 1), (0, 1), (1, 1),
];

/// Shared arc score over a pixel ring.
///
/// The score is the largest `t` for which `arc` consecutive ring pixels are
/// all brighter than `centre + t` or all darker than `centre - t`.
fn ring_score(
    img: &GrayImage,
    x: usize,
    y: usize,
    threshold: u8,
    ring: &[(i32, i32)],
    arc: usize,
    margin: usize,
) -> u8 {
    let (w, h) = img.dimensions();
    if x < margin || y < margin || x + margin >= w || y + margin >= h {
        return 0;
    }

    let centre = img.get(x, y) as i32;
    let mut bright = [0i32; 16];
    let mut dark = [0i32; 16];
    for (k, &(dx, dy)) in ring.iter().enumerate() {
        let p = img.get((x as i32 + dx) as usize, (y as i32 + dy) as usize) as i32;
        bright[k] = p - centre;
        dark[k] = centre - p;
    }
    let bright = &bright[..ring.len()];
    let dark = &dark[..ring.len()];

    // cheap rejection with the arc test at the requested threshold
    let t = threshold as i32;
    let bright_mask = ring_mask(bright.iter().map(|&d| d > t));
    let dark_mask = ring_mask(dark.iter().map(|&d| d > t));
    if !has_consecutive_bits(bright_mask, ring.len(), arc)
        && !has_consecutive_bits(dark_mask, ring.len(), arc)
    {
        return 0;
    }

    let best = best_arc_minimum(bright, arc).max(best_arc_minimum(dark, arc));
    (best - 1).clamp(0, 255) as u8
}

/// OAST 9-16: Bresenham circle of radius 3, arc of nine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Oast9_16;

impl Oast9_16 {
    /// Bresenham circle offsets, clockwise from the top
    pub const RING: [(i32, i32); 16] = [
        (0, -3), (1, -3), (2, -2), (3, -1),
        (3, 0), (3, 1), (2, 2), (1, 3),
        (0, 3), (-1, 3), (-2, 2), (-3, 1),
        (-3, 0), (-3, -1), (-2, -2), (-1, -3),
    ];
    pub const ARC: usize = 9;
    pub const MARGIN: usize = 3;
}

impl CornerScorer for Oast9_16 {
    fn margin(&self) -> usize {
        Self::MARGIN
    }

    fn score(&self, img: &GrayImage, x: usize, y: usize, threshold: u8) -> u8 {
        ring_score(img, x, y, threshold, &Self::RING, Self::ARC, Self::MARGIN)
    }
}

/// AGAST 5-8: the eight direct neighbours, arc of five.
#[derive(Debug, Clone, Copy, Default)]
pub struct Agast5_8;

impl Agast5_8 {
    pub const RING: [(i32, i32); 8] = [
        (-1, 0), (-1, -1), (0, -1), (1, -1),
        (1, 0), (1, 1), (0, 1), (-1, 1),
    ];
    pub const ARC: usize = 5;
    pub const MARGIN: usize = 2;
}

impl CornerScorer for Agast5_8 {
    fn margin(&self) -> usize {
        Self::MARGIN
    }

    fn score(&self, img: &GrayImage, x: usize, y: usize, threshold: u8) -> u8 {
        ring_score(img, x, y, threshold, &Self::RING, Self::ARC, Self::MARGIN)
    }
}
