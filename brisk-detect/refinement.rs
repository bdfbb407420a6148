//! Closed-form sub-pixel and sub-scale refinement of score maxima.
//!
//! Nothing here iterates. Degenerate fits fall back to a sample or a patch
//! corner so every result is finite.

/// Outcome of the 2-D quadratic fit over a 3x3 score patch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubpixelFit {
    /// Offset of the maximum from the patch centre, each within [-1, 1]
    pub dx: f32,
    pub dy: f32,
    /// Interpolated score at the offset
    pub score: f32,
}

/// Which neighbouring layers bracket the refined layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFit {
    /// Octave layer: below at 0.75, above at 1.5 relative scale
    Octave,
    /// Intra-octave layer: below at 2/3, above at 4/3
    Intra,
    /// Source layer: synthetic below at 0.5, above at 1.5
    Base,
}

impl ScaleFit {
    /// Relative scales reported when the fit is concave up:
    /// `(below, centre, above)`
    pub fn sample_codes(self) -> (f32, f32, f32) {
        match self {
            ScaleFit::Octave => (0.75, 1.0, 1.5),
            ScaleFit::Intra => (2.0 / 3.0, 1.0, 4.0 / 3.0),
            ScaleFit::Base => (0.7, 1.0, 1.5),
        }
    }

    /// Interval the fitted relative scale is clamped to
    pub fn interval(self) -> (f32, f32) {
        match self {
            ScaleFit::Octave => (0.75, 1.5),
            ScaleFit::Intra => (2.0 / 3.0, 4.0 / 3.0),
            ScaleFit::Base => (0.7, 1.5),
        }
    }

    /// Least-squares parabola coefficients `(a, b, c)` per sample, and the
    /// divisor mapping the fixed-point result back to score units.
    fn coefficients(self) -> ([i64; 3], [i64; 3], [i64; 3], f32) {
        match self {
            ScaleFit::Octave => ([16, -24, 8], [-40, 54, -14], [24, -27, 6], 3072.0),
            ScaleFit::Intra => ([9, -18, 9], [-21, 36, -15], [12, -16, 6], 2048.0),
            ScaleFit::Base => ([2, -4, 2], [-5, 8, -3], [3, -3, 1], 1024.0),
        }
    }
}

/// Subpixel and sub-scale refinement
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Fits a 2-D quadratic to the patch `s[i][j]` = score at
    /// `(x + i - 1, y + j - 1)` and returns its maximum inside the unit square.
    pub fn subpixel_2d(s: &[[i32; 3]; 3]) -> SubpixelFit {
        let [[s00, s01, s02], [s10, s11, s12], [s20, s21, s22]] =
            s.map(|column| column.map(i64::from));

        // coefficients of the least-squares fit, scaled by 18
        let tmp1 = s00 + s02 - 2 * s11 + s20 + s22;
        let c1 = 3 * (tmp1 + s01 - 2 * (s10 + s12) + s21);
        let c2 = 3 * (tmp1 - 2 * (s01 + s21) + s10 + s12);
        let tmp2 = s02 - s20;
        let tmp3 = s00 + tmp2 - s22;
        let tmp4 = tmp3 - 2 * tmp2;
        let c3 = -3 * (tmp3 + s01 - s21);
        let c4 = -3 * (tmp4 + s10 - s12);
        let c5 = 4 * (s00 - s02 - s20 + s22);
        let c6 = -2 * (s00 + s02 - 2 * (s10 + s01 + s12 + s21) - 5 * s11 + s20 + s22);

        let eval = |dx: f32, dy: f32| {
            (c1 as f32 * dx * dx
                + c2 as f32 * dy * dy
                + c3 as f32 * dx
                + c4 as f32 * dy
                + c5 as f32 * dx * dy
                + c6 as f32)
                / 18.0
        };

        let h_det = 4 * c1 * c2 - c5 * c5;
        if h_det == 0 {
            return SubpixelFit { dx: 0.0, dy: 0.0, score: c6 as f32 / 18.0 };
        }

        if !(h_det > 0 && c1 < 0) {
            // not a maximum: take the best patch corner
            let corners = [
                (1.0, 1.0, c3 + c4 + c5),
                (-1.0, 1.0, -c3 + c4 - c5),
                (1.0, -1.0, c3 - c4 - c5),
                (-1.0, -1.0, -c3 - c4 + c5),
            ];
            let (dx, dy, best) = corners
                .into_iter()
                .fold(corners[0], |acc, c| if c.2 > acc.2 { c } else { acc });
            return SubpixelFit {
                dx,
                dy,
                score: (best + c1 + c2 + c6) as f32 / 18.0,
            };
        }

        let dx = (2 * c2 * c3 - c4 * c5) as f32 / -(h_det as f32);
        let dy = (2 * c1 * c4 - c3 * c5) as f32 / -(h_det as f32);
        if (-1.0..=1.0).contains(&dx) && (-1.0..=1.0).contains(&dy) {
            return SubpixelFit { dx, dy, score: eval(dx, dy) };
        }

        // optimum outside the unit square: pin the offending axis to the
        // border and optimise the other one along it
        let along_x = if dx > 1.0 {
            Some((1.0, (-(c4 + c5) as f32 / (2 * c2) as f32).clamp(-1.0, 1.0)))
        } else if dx < -1.0 {
            Some((-1.0, (-(c4 - c5) as f32 / (2 * c2) as f32).clamp(-1.0, 1.0)))
        } else {
            None
        };
        let along_y = if dy > 1.0 {
            Some(((-(c3 + c5) as f32 / (2 * c1) as f32).clamp(-1.0, 1.0), 1.0))
        } else if dy < -1.0 {
            Some(((-(c3 - c5) as f32 / (2 * c1) as f32).clamp(-1.0, 1.0), -1.0))
        } else {
            None
        };

        let fit = |(dx, dy): (f32, f32)| SubpixelFit { dx, dy, score: eval(dx, dy) };
        match (along_x.map(fit), along_y.map(fit)) {
            (Some(a), Some(b)) => {
                if a.score > b.score {
                    a
                } else {
                    b
                }
            }
            (Some(a), None) => a,
            (None, Some(b)) => b,
            // NaN offsets only; the Hessian test rules them out
            (None, None) => SubpixelFit { dx: 0.0, dy: 0.0, score: c6 as f32 / 18.0 },
        }
    }

    /// Fits a parabola through scores sampled below, at and above the layer
    /// and returns `(relative_scale, refined_score)`.
    pub fn refine_1d(fit: ScaleFit, s_below: f32, s0: f32, s_above: f32) -> (f32, f32) {
        let fixed = |s: f32| (1024.0 * s + 0.5) as i64;
        let samples = [fixed(s_below), fixed(s0), fixed(s_above)];
        let (ka, kb, kc, divisor) = fit.coefficients();
        let dot = |k: [i64; 3]| k[0] * samples[0] + k[1] * samples[1] + k[2] * samples[2];

        let a = dot(ka);
        if a >= 0 {
            // second derivative must be negative
            let (code_below, code_centre, code_above) = fit.sample_codes();
            if s0 >= s_below && s0 >= s_above {
                return (code_centre, s0);
            }
            if s_below >= s0 && s_below >= s_above {
                return (code_below, s_below);
            }
            return (code_above, s_above);
        }

        let b = dot(kb);
        let c = dot(kc);
        let (lo, hi) = fit.interval();
        let r = (-(b as f32) / (2 * a) as f32).clamp(lo, hi);
        let max = (c as f32 + a as f32 * r * r + b as f32 * r) / divisor;
        (r, max)
    }
}
