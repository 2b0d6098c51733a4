//! Palette-based flower detection for top-down aerial imagery.
//!
//! Two pipelines share this crate:
//! - [`palette_builder`] learns a color palette from sample images of the
//!   target (mean-shift clustering of HSV samples);
//! - [`detect`] uses that palette to find and outline matching regions in
//!   new images.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use js_sys::{Array, Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;

pub mod color;
pub mod config;
pub mod detect;
pub mod error;
pub mod mean_shift;
pub mod palette_builder;
pub mod palette_io;

#[cfg(not(target_arch = "wasm32"))]
pub mod batch;

pub use color::{HsvCartesian, HsvPolar};
pub use config::{Config, DetectionConfig, PaletteConfig, StructuringElement};
pub use detect::{Contour, Detection, FlowerLocator};
pub use error::{PipelineError, Result};
pub use palette_builder::{build_palette, Palette, PaletteBuilder, PaletteEntry};

// ------------------------------------------------------------
// Encoded-image entry points
// ------------------------------------------------------------

/// Builds a palette from encoded training images (any format `image` can
/// decode).
pub fn generate_palette_bytes(inputs: &[Vec<u8>], config: &PaletteConfig) -> Result<Palette> {
    let mut builder = PaletteBuilder::new(config.clone());
    for input in inputs {
        let img = image::load_from_memory(input)?;
        builder.add_image(&img)?;
    }
    builder.build()
}

/// Runs detection on an encoded image and returns the annotated image as
/// PNG together with the number of contours found.
pub fn locate_flowers_bytes(
    input: &[u8],
    palette: &Palette,
    config: &DetectionConfig,
) -> Result<(Vec<u8>, usize)> {
    let img = image::load_from_memory(input)?;
    let detection = detect::locate_flowers(&img, palette, config)?;

    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(detection.annotated).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok((buf, detection.contours.len()))
}

// ------------------------------------------------------------
// Browser bindings
// ------------------------------------------------------------

fn to_js(err: PipelineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Builds a palette from an array of encoded images (`Uint8Array`s) and
/// returns it as CSV text.
#[wasm_bindgen(js_name = generatePalette)]
pub fn generate_palette_js(images: Array) -> std::result::Result<String, JsValue> {
    let inputs: Vec<Vec<u8>> = images.iter().map(|val| Uint8Array::new(&val).to_vec()).collect();
    let palette = generate_palette_bytes(&inputs, &PaletteConfig::default()).map_err(to_js)?;
    Ok(palette.to_csv_string())
}

/// Outlines palette-colored regions of an encoded image.
///
/// Returns `{ image: Uint8Array /* PNG */, contours: number }`.
#[wasm_bindgen(js_name = locateFlowers)]
pub fn locate_flowers_js(input: Vec<u8>, palette_csv: &str) -> std::result::Result<Object, JsValue> {
    let palette = Palette::from_csv_str(palette_csv).map_err(to_js)?;
    let (png, contours) =
        locate_flowers_bytes(&input, &palette, &DetectionConfig::default()).map_err(to_js)?;

    let result = Object::new();
    Reflect::set(&result, &JsValue::from_str("image"), &Uint8Array::from(png.as_slice()))?;
    Reflect::set(
        &result,
        &JsValue::from_str("contours"),
        &JsValue::from_f64(contours as f64),
    )?;
    Ok(result)
}
