//! Flower detection against a learned palette.
//!
//! Stages, in order:
//! 1. [`edges`]: keep only pixels next to prominent edges.
//! 2. [`masker`]: select the remaining pixels that match the palette.
//! 3. [`noise`]: dilate / erode / dilate to drop speckle and merge fragments.
//! 4. [`contours`]: trace external contours and draw them on the original.

pub mod contours;
pub mod edges;
pub mod masker;
pub mod morphology;
pub mod noise;

use image::DynamicImage;
use log::debug;

use crate::color::require_rgb;
use crate::config::DetectionConfig;
use crate::error::Result;
use crate::palette_builder::Palette;

pub use contours::{detect_and_draw, Contour, Detection};
pub use edges::detect_edges;
pub use masker::apply_palette;
pub use noise::denoise;

/// Runs the detection stages with one palette and configuration.
///
/// The locator only borrows the palette, so one palette can back any number
/// of locators running side by side.
#[derive(Debug, Clone)]
pub struct FlowerLocator<'p> {
    palette: &'p Palette,
    config: DetectionConfig,
}

impl<'p> FlowerLocator<'p> {
    pub fn new(palette: &'p Palette, config: DetectionConfig) -> Self {
        Self { palette, config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn locate(&self, image: &DynamicImage) -> Result<Detection> {
        let original = require_rgb(image)?;

        // ----------------------
        // 1. Edge restriction
        // ----------------------
        let restricted = detect_edges(&original, &self.config)?;

        // ----------------------
        // 2. Palette selection
        // ----------------------
        let mask = apply_palette(&restricted, self.palette);

        // ----------------------
        // 3. Cleanup
        // ----------------------
        let clean = denoise(&mask, &self.config.noise, &self.config.element);

        // ----------------------
        // 4. Contours
        // ----------------------
        let detection = detect_and_draw(&original, &clean, &self.config.contour);
        debug!(
            "{}x{} image: {} contours",
            original.width(),
            original.height(),
            detection.contours.len()
        );
        Ok(detection)
    }
}

/// Detects palette-colored regions in `image` and outlines them.
pub fn locate_flowers(image: &DynamicImage, palette: &Palette, config: &DetectionConfig) -> Result<Detection> {
    FlowerLocator::new(palette, config.clone()).locate(image)
}
