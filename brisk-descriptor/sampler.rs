//! Smoothed intensity of a pattern point around a keypoint.

use brisk_core::sampling::smoothed_fixed_with_sums;
use brisk_core::{GrayImage, ImageError, ImageResult, IntegralImage};

use crate::pattern::PatternPoint;

/// Mean intensity over the point's smoothing window, in 1/1024 units.
///
/// Windows of half a pixel or more read their interior through the integral
/// image. Smaller ones fall back to bilinear interpolation.
pub fn smoothed_intensity(
    img: &GrayImage,
    integral: &IntegralImage,
    key_x: f32,
    key_y: f32,
    point: &PatternPoint,
) -> ImageResult<i64> {
    let xf = point.x + key_x;
    let yf = point.y + key_y;
    smoothed_fixed_with_sums(
        xf,
        yf,
        point.sigma,
        |x, y| {
            img.try_get(x, y).map(i64::from).ok_or(ImageError::OutOfBounds {
                x,
                y,
                width: img.width(),
                height: img.height(),
            })
        },
        |x0, y0, x1, y1| integral.rect_sum(x0, y0, x1, y1).map(|s| s as i64),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_gradient_image() -> GrayImage {
        GrayImage::from_fn(32, 32, |x, _| (x * 4) as u8)
    }

    #[test]
    fn test_flat_image_samples_its_value() {
        let img = GrayImage::from_fn(32, 32, |_, _| 77);
        let integral = IntegralImage::new(&img);
        for sigma in [0.3, 0.65, 1.7, 4.0] {
            let point = PatternPoint { x: 1.3, y: -2.6, sigma };
            let v = smoothed_intensity(&img, &integral, 16.0, 16.0, &point).unwrap();
            assert!((v - 77 * 1024).abs() < 64, "sigma {sigma}: {v}");
        }
    }

    #[test]
    fn test_gradient_is_preserved_by_averaging() {
        let img = create_gradient_image();
        let integral = IntegralImage::new(&img);
        let left = PatternPoint { x: -3.0, y: 0.0, sigma: 2.0 };
        let right = PatternPoint { x: 3.0, y: 0.0, sigma: 2.0 };
        let a = smoothed_intensity(&img, &integral, 16.0, 16.0, &left).unwrap();
        let b = smoothed_intensity(&img, &integral, 16.0, 16.0, &right).unwrap();
        assert!(b > a);
        // six pixels of a slope of four
        assert!(((b - a) - 24 * 1024).abs() < 1024);
    }

    #[test]
    fn test_window_outside_image_is_an_error() {
        let img = create_gradient_image();
        let integral = IntegralImage::new(&img);
        let point = PatternPoint { x: 0.0, y: 0.0, sigma: 3.0 };
        assert!(matches!(
            smoothed_intensity(&img, &integral, 1.0, 16.0, &point),
            Err(ImageError::OutOfBounds { .. })
        ));
    }
}
