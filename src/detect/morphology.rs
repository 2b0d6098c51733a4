//! Iterated binary morphology with an explicit structuring element.
//!
//! Masks are treated as binary: any non-zero pixel is foreground and
//! outputs are 0 or 255.

use image::GrayImage;
use imageproc::morphology::{dilate_mut, erode_mut};

use crate::config::StructuringElement;

pub fn dilate(mask: &GrayImage, element: &StructuringElement, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        dilate_mut(&mut out, element.norm(), element.radius);
    }
    out
}

pub fn erode(mask: &GrayImage, element: &StructuringElement, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        erode_mut(&mut out, element.norm(), element.radius);
    }
    out
}
