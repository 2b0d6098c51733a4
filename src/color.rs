//! Pixel color representations used by both pipelines.
//!
//! Colors are handled in two forms: the cylindrical HSV form (`HsvPolar`,
//! hue in degrees over the full circle, saturation and value in percent) and
//! its Cartesian projection (`HsvCartesian`). The projection maps hues 359°
//! and 1° next to each other, which is what clustering needs; interval tests
//! stay in polar form.

use image::{DynamicImage, Rgb, RgbImage};
use palette::{Hsv, IntoColor, Srgb};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const FULL_TURN: f64 = 360.0;
pub const PERCENT: f64 = 100.0;

/// HSV color with `h` in [0, 360), `s` and `v` in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HsvPolar {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

/// Cartesian projection of an HSV color onto the unit cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HsvCartesian {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl HsvPolar {
    pub fn new(h: f64, s: f64, v: f64) -> Self {
        Self { h, s, v }
    }

    pub fn from_rgb(pixel: Rgb<u8>) -> Self {
        let [r, g, b] = pixel.0;
        let hsv: Hsv = Srgb::new(r, g, b).into_format::<f32>().into_color();
        Self {
            h: f64::from(hsv.hue.into_positive_degrees()),
            s: f64::from(hsv.saturation) * PERCENT,
            v: f64::from(hsv.value) * PERCENT,
        }
    }

    /// Pixel given in device (blue, green, red) order.
    pub fn from_bgr(b: u8, g: u8, r: u8) -> Self {
        Self::from_rgb(Rgb([r, g, b]))
    }

    pub fn to_cartesian(self) -> HsvCartesian {
        let angle = self.h.to_radians();
        let radius = self.s / PERCENT;
        HsvCartesian {
            x: radius * angle.cos(),
            y: radius * angle.sin(),
            z: self.v / PERCENT,
        }
    }

    pub fn channels(&self) -> [f64; 3] {
        [self.h, self.s, self.v]
    }
}

impl HsvCartesian {
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Borrows or converts a decoded image into 8-bit RGB, refusing anything
/// that does not carry exactly three channels.
pub fn require_rgb(image: &DynamicImage) -> Result<RgbImage> {
    let found = image.color().channel_count();
    if found != 3 {
        return Err(PipelineError::ChannelCount { found });
    }
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyImage { width, height });
    }
    Ok(match image {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => other.to_rgb8(),
    })
}

/// Builds an RGB image from a tightly packed buffer in device (BGR) order.
pub fn rgb_image_from_bgr(width: u32, height: u32, channels: u8, data: &[u8]) -> Result<RgbImage> {
    if channels != 3 {
        return Err(PipelineError::ChannelCount { found: channels });
    }
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyImage { width, height });
    }
    let expected = width as usize * height as usize * 3;
    if data.len() != expected {
        return Err(PipelineError::BufferSize {
            width,
            height,
            channels,
            actual: data.len(),
        });
    }

    let rgb: Vec<u8> = data
        .chunks_exact(3)
        .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
        .collect();
    RgbImage::from_raw(width, height, rgb).ok_or(PipelineError::BufferSize {
        width,
        height,
        channels,
        actual: data.len(),
    })
}

/// Polar and Cartesian forms of every pixel, both in row-major order.
pub fn hsv_samples(image: &RgbImage) -> (Vec<HsvPolar>, Vec<HsvCartesian>) {
    image
        .pixels()
        .map(|&pixel| {
            let polar = HsvPolar::from_rgb(pixel);
            (polar, polar.to_cartesian())
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbaImage};

    const EPS: f64 = 1e-9;

    #[test]
    fn achromatic_projects_onto_axis() {
        let c = HsvPolar::new(0.0, 0.0, 42.0).to_cartesian();
        assert!(c.x.abs() < EPS);
        assert!(c.y.abs() < EPS);
        assert!((c.z - 0.42).abs() < EPS);
    }

    #[test]
    fn quarter_turn_projects_onto_y() {
        let c = HsvPolar::new(90.0, 100.0, 100.0).to_cartesian();
        assert!(c.x.abs() < 1e-12);
        assert!((c.y - 1.0).abs() < EPS);
        assert!((c.z - 1.0).abs() < EPS);
    }

    #[test]
    fn hues_across_wraparound_are_neighbours() {
        let a = HsvPolar::new(359.0, 80.0, 50.0).to_cartesian();
        let b = HsvPolar::new(1.0, 80.0, 50.0).to_cartesian();
        let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt();
        assert!(d < 0.03, "distance {d}");
    }

    #[test]
    fn device_red_is_full_hue_zero() {
        let red = HsvPolar::from_bgr(0, 0, 255);
        assert!(red.h.abs() < 1e-4 || (FULL_TURN - red.h).abs() < 1e-4);
        assert!((red.s - 100.0).abs() < 1e-4);
        assert!((red.v - 100.0).abs() < 1e-4);

        let blue = HsvPolar::from_rgb(Rgb([0, 0, 255]));
        assert!((blue.h - 240.0).abs() < 1e-3);
    }

    #[test]
    fn grey_has_no_saturation() {
        let grey = HsvPolar::from_rgb(Rgb([128, 128, 128]));
        assert_eq!(grey.s, 0.0);
        assert!((grey.v - 128.0 / 255.0 * 100.0).abs() < 1e-4);
    }

    #[test]
    fn rejects_non_three_channel_images() {
        let gray = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        assert!(matches!(require_rgb(&gray), Err(PipelineError::ChannelCount { found: 1 })));

        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        assert!(matches!(require_rgb(&rgba), Err(PipelineError::ChannelCount { found: 4 })));
    }

    #[test]
    fn bgr_buffer_is_reordered() {
        let img = rgb_image_from_bgr(2, 1, 3, &[0, 0, 255, 255, 0, 0]).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([0, 0, 255]));
    }

    #[test]
    fn bgr_buffer_checks_shape() {
        assert!(matches!(
            rgb_image_from_bgr(2, 2, 4, &[0; 16]),
            Err(PipelineError::ChannelCount { found: 4 })
        ));
        assert!(matches!(
            rgb_image_from_bgr(2, 2, 3, &[0; 11]),
            Err(PipelineError::BufferSize { actual: 11, .. })
        ));
    }

    #[test]
    fn samples_keep_matching_order() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        let (polar, cart) = hsv_samples(&img);
        assert_eq!(polar.len(), 4);
        assert_eq!(cart.len(), 4);
        assert!((polar[1].h - 120.0).abs() < 1e-3);
        assert_eq!(cart[1], polar[1].to_cartesian());
        assert_eq!(polar[0].v, 0.0);
    }
}
