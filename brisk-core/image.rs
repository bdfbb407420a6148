use crate::error::{ImageError, ImageResult};

/// Row-major 8-bit grayscale image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl GrayImage {
    /// Black image of the given size. Either dimension may be zero.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Wraps a row-major buffer, validating its length.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> ImageResult<Self> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidImageSize { width, height });
        }
        let expected_len = width * height;
        if data.len() != expected_len {
            return Err(ImageError::InvalidImageData {
                expected_len,
                actual_len: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Builds an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_raw(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Pixel at (x, y). Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Pixel at signed coordinates, `None` outside the image.
    #[inline]
    pub fn try_get(&self, x: i64, y: i64) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.data[y as usize * self.width + x as usize])
    }

    /// Row `y` as a slice.
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Image rotated by 180 degrees about its centre.
    pub fn rotate180(&self) -> Self {
        let mut data = self.data.clone();
        data.reverse();
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// Summed-area table with one extra leading row and column of zeros.
///
/// `sums[(y * (width + 1)) + x]` holds the sum of all pixels strictly above
/// row `y` and strictly left of column `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegralImage {
    width: usize,
    height: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    pub fn new(img: &GrayImage) -> Self {
        let (width, height) = img.dimensions();
        let stride = width + 1;
        let mut sums = vec![0u64; stride * (height + 1)];
        for y in 0..height {
            let mut row_sum = 0u64;
            let row = img.row(y);
            for x in 0..width {
                row_sum += row[x] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }
        Self { width, height, sums }
    }

    /// Wraps precomputed sums for a `width` x `height` image.
    pub fn from_raw(width: usize, height: usize, sums: Vec<u64>) -> ImageResult<Self> {
        let expected_len = (width + 1) * (height + 1);
        if sums.len() != expected_len {
            return Err(ImageError::InvalidImageData {
                expected_len,
                actual_len: sums.len(),
            });
        }
        Ok(Self { width, height, sums })
    }

    /// Width of the image this table was built from.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the image this table was built from.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Checks that this table indexes the same pixel grid as `img`.
    pub fn check_matches(&self, img: &GrayImage) -> ImageResult<()> {
        if self.width != img.width() || self.height != img.height() {
            return Err(ImageError::IntegralMismatch {
                width: img.width(),
                height: img.height(),
                integral_width: self.width,
                integral_height: self.height,
            });
        }
        Ok(())
    }

    /// Sum of pixels in `[x0, x1) x [y0, y1)`.
    pub fn rect_sum(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> ImageResult<u64> {
        if x1 <= x0 || y1 <= y0 {
            return Ok(0);
        }
        if x0 < 0 || y0 < 0 || x1 > self.width as i64 || y1 > self.height as i64 {
            let (x, y) = if x0 < 0 || y0 < 0 { (x0, y0) } else { (x1 - 1, y1 - 1) };
            return Err(ImageError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let stride = self.width + 1;
        let at = |x: i64, y: i64| self.sums[y as usize * stride + x as usize];
        Ok(at(x1, y1) + at(x0, y0) - at(x1, y0) - at(x0, y1))
    }
}
