//! Adaptive edge detection and edge restriction.
//!
//! Color thresholding over flat regions matches far too much, so detection
//! only looks at pixels next to prominent edges. Canny thresholds follow the
//! median intensity of the frame.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::separable_filter_equal;
use log::debug;

use super::morphology::dilate;
use crate::config::DetectionConfig;
use crate::error::{PipelineError, Result};

/// Thresholds never drop below this, otherwise zero-gradient pixels would
/// pass the edge test.
const MIN_THRESHOLD: f32 = 1.0;
const MAX_THRESHOLD: f32 = 255.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CannyThresholds {
    pub low: f32,
    pub high: f32,
}

/// Median intensity; the mean of the two middle values for even pixel counts.
pub fn median_intensity(gray: &GrayImage) -> f32 {
    let n = gray.width() as usize * gray.height() as usize;
    if n == 0 {
        return 0.0;
    }

    let mut histogram = [0usize; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let value_at_rank = |rank: usize| -> f32 {
        let mut seen = 0;
        for (value, count) in histogram.iter().enumerate() {
            seen += count;
            if seen > rank {
                return value as f32;
            }
        }
        MAX_THRESHOLD
    };

    (value_at_rank((n - 1) / 2) + value_at_rank(n / 2)) / 2.0
}

pub fn canny_thresholds(gray: &GrayImage, config: &DetectionConfig) -> CannyThresholds {
    let median = median_intensity(gray);
    let low = (config.edges.low_ratio * median)
        .floor()
        .clamp(MIN_THRESHOLD, MAX_THRESHOLD);
    let high = (config.edges.high_ratio * median)
        .floor()
        .clamp(MIN_THRESHOLD, MAX_THRESHOLD)
        .max(low);
    debug!("median intensity {median}, canny thresholds {low}..{high}");
    CannyThresholds { low, high }
}

/// Normalised 1-D Gaussian taps for a `size`×`size` separable blur, with the
/// sigma conventionally derived from the kernel size.
pub fn gaussian_kernel(size: u32) -> Result<Vec<f32>> {
    if size == 0 || size % 2 == 0 {
        return Err(PipelineError::invalid_parameter("blur_kernel", size));
    }
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f32;
    let mut taps: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.iter_mut().for_each(|t| *t /= sum);
    Ok(taps)
}

/// Dilated Canny edge mask of `image`.
pub fn edge_mask(image: &RgbImage, config: &DetectionConfig) -> Result<GrayImage> {
    let thresholds = canny_thresholds(&image::imageops::grayscale(image), config);

    let kernel = gaussian_kernel(config.edges.blur_kernel)?;
    let blurred = separable_filter_equal(image, kernel.as_slice());

    let edges = canny(
        &image::imageops::grayscale(&blurred),
        thresholds.low,
        thresholds.high,
    );
    Ok(dilate(&edges, &config.element, config.edges.dilate_iterations))
}

/// Copy of `image` with every pixel outside `mask` set to black.
pub fn restrict_to_mask(image: &RgbImage, mask: &GrayImage) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for ((dst, src), m) in out.pixels_mut().zip(image.pixels()).zip(mask.pixels()) {
        if m[0] != 0 {
            *dst = *src;
        } else {
            *dst = Rgb([0, 0, 0]);
        }
    }
    out
}

/// Keeps only the pixels of `image` that lie on or next to a prominent edge.
pub fn detect_edges(image: &RgbImage, config: &DetectionConfig) -> Result<RgbImage> {
    let mask = edge_mask(image, config)?;
    debug!(
        "edge mask covers {} of {} pixels",
        mask.pixels().filter(|p| p[0] != 0).count(),
        mask.width() * mask.height()
    );
    Ok(restrict_to_mask(image, &mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn square_scene() -> RgbImage {
        RgbImage::from_fn(60, 60, |x, y| {
            if (15..45).contains(&x) && (15..45).contains(&y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn median_of_even_count_averages_middles() {
        let gray = GrayImage::from_raw(4, 1, vec![10, 20, 30, 200]).unwrap();
        assert_eq!(median_intensity(&gray), 25.0);
        let odd = GrayImage::from_raw(3, 1, vec![9, 1, 5]).unwrap();
        assert_eq!(median_intensity(&odd), 5.0);
    }

    #[test]
    fn thresholds_scale_with_median() {
        let gray = GrayImage::from_pixel(8, 8, Luma([100]));
        let t = canny_thresholds(&gray, &DetectionConfig::default());
        assert_eq!(t, CannyThresholds { low: 67.0, high: 133.0 });
    }

    #[test]
    fn thresholds_are_clamped() {
        let dark = canny_thresholds(&GrayImage::new(8, 8), &DetectionConfig::default());
        assert_eq!(dark, CannyThresholds { low: 1.0, high: 1.0 });

        let bright = canny_thresholds(&GrayImage::from_pixel(8, 8, Luma([250])), &DetectionConfig::default());
        assert_eq!(bright.high, 255.0);
        assert_eq!(bright.low, 167.0);
    }

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let k = gaussian_kernel(7).unwrap();
        assert_eq!(k.len(), 7);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((k[0] - k[6]).abs() < 1e-7);
        assert!(k[3] > k[2] && k[2] > k[1]);
        assert!(gaussian_kernel(6).is_err());
    }

    #[test]
    fn flat_image_has_no_edges() {
        let flat = RgbImage::from_pixel(20, 20, Rgb([90, 140, 60]));
        let mask = edge_mask(&flat, &DetectionConfig::default()).unwrap();
        assert!(mask.pixels().all(|p| p[0] == 0));
        let restricted = detect_edges(&flat, &DetectionConfig::default()).unwrap();
        assert!(restricted.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn restriction_keeps_square_boundary_only() {
        let scene = square_scene();
        let restricted = detect_edges(&scene, &DetectionConfig::default()).unwrap();

        assert_eq!(restricted.dimensions(), scene.dimensions());
        // The square's centre is far from any edge and must be cleared.
        assert_eq!(restricted.get_pixel(30, 30).0, [0, 0, 0]);
        let kept = (15..45)
            .flat_map(|y| (15..45).map(move |x| (x, y)))
            .filter(|&(x, y)| restricted.get_pixel(x, y).0 == [255, 255, 255])
            .count();
        assert!(kept > 0);
        assert!(kept < 900);
    }
}
