//! Morphological cleanup of the color mask.
//!
//! The first dilation merges fragments of true detections but also inflates
//! speckle; the erosion runs one step longer and removes the inflated speckle
//! while merged regions survive; the final dilation grows the survivors back
//! out. The iteration counts are tuned constants, not derived from content.

use image::GrayImage;
use log::debug;

use super::morphology::{dilate, erode};
use crate::config::{NoiseConfig, StructuringElement};

pub fn denoise(mask: &GrayImage, config: &NoiseConfig, element: &StructuringElement) -> GrayImage {
    let merged = dilate(mask, element, config.merge_dilations);
    let shrunk = erode(&merged, element, config.erosions);
    let clean = dilate(&shrunk, element, config.grow_dilations);

    debug!(
        "denoise: {} -> {} foreground pixels",
        mask.pixels().filter(|p| p[0] != 0).count(),
        clean.pixels().filter(|p| p[0] != 0).count()
    );
    clean
}
