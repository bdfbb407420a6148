//! Fixed-point area sampling shared by the score-map lookup and the
//! descriptor sampler.
//!
//! Both callers estimate the mean of a pixel-like grid over a square window
//! of half-width `sigma_half` centred on a sub-pixel position. Results are
//! returned in 1/1024 units. Below half a pixel the window degenerates to a
//! bilinear blend of the four surrounding cells.

use log::warn;

/// Sub-pixel steps per unit in every fixed-point result.
pub const SUBPIXEL_STEPS: i64 = 1024;

/// Total fixed-point weight spread over a window, independent of its area.
const WINDOW_WEIGHT: f32 = 4_194_304.0;

/// Bilinear interpolation at `(xf, yf)`, in 1/1024 units.
pub fn bilinear_fixed<E>(
    xf: f32,
    yf: f32,
    mut cell: impl FnMut(i64, i64) -> Result<i64, E>,
) -> Result<i64, E> {
    let x = xf.floor();
    let y = yf.floor();
    let r_x = ((xf - x) * SUBPIXEL_STEPS as f32) as i64;
    let r_y = ((yf - y) * SUBPIXEL_STEPS as f32) as i64;
    let r_x_1 = SUBPIXEL_STEPS - r_x;
    let r_y_1 = SUBPIXEL_STEPS - r_y;
    let (x, y) = (x as i64, y as i64);

    let acc = r_x_1 * r_y_1 * cell(x, y)?
        + r_x * r_y_1 * cell(x + 1, y)?
        + r_x_1 * r_y * cell(x, y + 1)?
        + r_x * r_y * cell(x + 1, y + 1)?;
    Ok((acc + SUBPIXEL_STEPS / 2) / SUBPIXEL_STEPS)
}

/// Weights of a square averaging window with partially covered borders.
///
/// The window is split into four corner cells, four edge strips and a fully
/// covered interior. Every part carries an integer weight proportional to the
/// fraction of the cell it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaWindow {
    x_left: i64,
    y_top: i64,
    x_right: i64,
    y_bottom: i64,
    top_left: i64,
    top_right: i64,
    bottom_right: i64,
    bottom_left: i64,
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
    scaling: i64,
    scaling2: i64,
}

impl AreaWindow {
    /// Window of half-width `sigma_half` around `(xf, yf)`.
    ///
    /// Returns `None` when the window is too small or too large to carry a
    /// non-zero fixed-point normaliser.
    pub fn new(xf: f32, yf: f32, sigma_half: f32) -> Option<Self> {
        if !(sigma_half.is_finite() && sigma_half > 0.0) {
            return None;
        }
        let area = 4.0 * sigma_half * sigma_half;
        let scaling = (WINDOW_WEIGHT / area) as i64;
        let scaling2 = (scaling as f32 * area / SUBPIXEL_STEPS as f32) as i64;
        if scaling == 0 || scaling2 == 0 {
            return None;
        }

        let x_1 = xf - sigma_half;
        let x1 = xf + sigma_half;
        let y_1 = yf - sigma_half;
        let y1 = yf + sigma_half;

        let x_left = (x_1 + 0.5).floor();
        let y_top = (y_1 + 0.5).floor();
        let x_right = (x1 + 0.5).floor();
        let y_bottom = (y1 + 0.5).floor();

        // covered fractions of the border cells
        let r_x_1 = x_left - x_1 + 0.5;
        let r_y_1 = y_top - y_1 + 0.5;
        let r_x1 = x1 - x_right + 0.5;
        let r_y1 = y1 - y_bottom + 0.5;

        let s = scaling as f32;
        Some(Self {
            x_left: x_left as i64,
            y_top: y_top as i64,
            x_right: x_right as i64,
            y_bottom: y_bottom as i64,
            top_left: (r_x_1 * r_y_1 * s) as i64,
            top_right: (r_x1 * r_y_1 * s) as i64,
            bottom_right: (r_x1 * r_y1 * s) as i64,
            bottom_left: (r_x_1 * r_y1 * s) as i64,
            left: (r_x_1 * s) as i64,
            top: (r_y_1 * s) as i64,
            right: (r_x1 * s) as i64,
            bottom: (r_y1 * s) as i64,
            scaling,
            scaling2,
        })
    }

    /// Inclusive cell bounds `(x_left, y_top, x_right, y_bottom)`.
    pub fn bounds(&self) -> (i64, i64, i64, i64) {
        (self.x_left, self.y_top, self.x_right, self.y_bottom)
    }

    fn corners<E>(&self, cell: &mut impl FnMut(i64, i64) -> Result<i64, E>) -> Result<i64, E> {
        Ok(self.top_left * cell(self.x_left, self.y_top)?
            + self.top_right * cell(self.x_right, self.y_top)?
            + self.bottom_right * cell(self.x_right, self.y_bottom)?
            + self.bottom_left * cell(self.x_left, self.y_bottom)?)
    }

    /// Weighted window sum reading every cell individually.
    pub fn accumulate<E>(
        &self,
        mut cell: impl FnMut(i64, i64) -> Result<i64, E>,
    ) -> Result<i64, E> {
        let mut acc = self.corners(&mut cell)?;
        for x in self.x_left + 1..self.x_right {
            acc += self.top * cell(x, self.y_top)?;
            acc += self.bottom * cell(x, self.y_bottom)?;
        }
        for y in self.y_top + 1..self.y_bottom {
            acc += self.left * cell(self.x_left, y)?;
            acc += self.right * cell(self.x_right, y)?;
            for x in self.x_left + 1..self.x_right {
                acc += self.scaling * cell(x, y)?;
            }
        }
        Ok(acc)
    }

    /// Weighted window sum with edges and interior read as rectangle sums
    /// over `[x0, x1) x [y0, y1)`.
    pub fn accumulate_with_sums<E>(
        &self,
        mut cell: impl FnMut(i64, i64) -> Result<i64, E>,
        mut rect_sum: impl FnMut(i64, i64, i64, i64) -> Result<i64, E>,
    ) -> Result<i64, E> {
        let (xl, yt, xr, yb) = self.bounds();
        let mut acc = self.corners(&mut cell)?;
        acc += self.top * rect_sum(xl + 1, yt, xr, yt + 1)?;
        acc += self.bottom * rect_sum(xl + 1, yb, xr, yb + 1)?;
        acc += self.left * rect_sum(xl, yt + 1, xl + 1, yb)?;
        acc += self.right * rect_sum(xr, yt + 1, xr + 1, yb)?;
        acc += self.scaling * rect_sum(xl + 1, yt + 1, xr, yb)?;
        Ok(acc)
    }

    /// Converts an accumulated sum into the window mean in 1/1024 units.
    pub fn normalize(&self, acc: i64) -> i64 {
        (acc + self.scaling2 / 2) / self.scaling2
    }
}

/// Smoothed value at `(xf, yf)` over a window of half-width `sigma_half`,
/// in 1/1024 units, reading cells one by one.
pub fn smoothed_fixed<E>(
    xf: f32,
    yf: f32,
    sigma_half: f32,
    mut cell: impl FnMut(i64, i64) -> Result<i64, E>,
) -> Result<i64, E> {
    if sigma_half < 0.5 {
        return bilinear_fixed(xf, yf, cell);
    }
    match AreaWindow::new(xf, yf, sigma_half) {
        Some(window) => {
            let acc = window.accumulate(&mut cell)?;
            Ok(window.normalize(acc))
        }
        None => {
            warn!(
                "degenerate averaging window (sigma {sigma_half}) at ({xf:.2}, {yf:.2}); using bilinear sample"
            );
            bilinear_fixed(xf, yf, cell)
        }
    }
}

/// Like [`smoothed_fixed`], with the interior and edges served by a
/// rectangle-sum oracle such as an integral image.
pub fn smoothed_fixed_with_sums<E>(
    xf: f32,
    yf: f32,
    sigma_half: f32,
    mut cell: impl FnMut(i64, i64) -> Result<i64, E>,
    rect_sum: impl FnMut(i64, i64, i64, i64) -> Result<i64, E>,
) -> Result<i64, E> {
    if sigma_half < 0.5 {
        return bilinear_fixed(xf, yf, cell);
    }
    match AreaWindow::new(xf, yf, sigma_half) {
        Some(window) => {
            let acc = window.accumulate_with_sums(&mut cell, rect_sum)?;
            Ok(window.normalize(acc))
        }
        None => {
            warn!(
                "degenerate averaging window (sigma {sigma_half}) at ({xf:.2}, {yf:.2}); using bilinear sample"
            );
            bilinear_fixed(xf, yf, cell)
        }
    }
}
