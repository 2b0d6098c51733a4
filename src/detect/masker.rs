//! Palette-driven color selection.
//!
//! Each palette entry accepts the pixels whose hue, saturation and value all
//! fall inside `mean ± std`. The hue test runs on the circle, so an entry
//! centred near 0° also accepts hues just below 360°.

use image::{GrayImage, Luma, RgbImage};
use log::{debug, warn};

use crate::color::{HsvPolar, FULL_TURN};
use crate::palette_builder::{Palette, PaletteEntry};

pub const MASK_ON: u8 = 255;

/// Inclusive interval on a linear channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelRange {
    Empty,
    Span { lower: f64, upper: f64 },
}

impl ChannelRange {
    pub fn new(lower: f64, upper: f64) -> Self {
        if lower > upper || lower.is_nan() || upper.is_nan() {
            warn!("inverted channel interval [{lower}, {upper}] treated as empty");
            return Self::Empty;
        }
        Self::Span { lower, upper }
    }

    pub fn contains(&self, value: f64) -> bool {
        match *self {
            Self::Empty => false,
            Self::Span { lower, upper } => lower <= value && value <= upper,
        }
    }
}

/// Inclusive interval on the hue circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HueRange {
    Empty,
    Full,
    /// `start <= h <= end` when `start <= end`, otherwise the arc crossing 0°.
    Arc { start: f64, end: f64 },
}

impl HueRange {
    pub fn new(lower: f64, upper: f64) -> Self {
        if lower > upper || lower.is_nan() || upper.is_nan() {
            warn!("inverted hue interval [{lower}, {upper}] treated as empty");
            return Self::Empty;
        }
        if upper - lower >= FULL_TURN {
            return Self::Full;
        }
        Self::Arc {
            start: lower.rem_euclid(FULL_TURN),
            end: upper.rem_euclid(FULL_TURN),
        }
    }

    pub fn contains(&self, hue: f64) -> bool {
        match *self {
            Self::Empty => false,
            Self::Full => true,
            Self::Arc { start, end } if start <= end => start <= hue && hue <= end,
            Self::Arc { start, end } => hue >= start || hue <= end,
        }
    }
}

/// Acceptance region of a single palette entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBounds {
    pub hue: HueRange,
    pub saturation: ChannelRange,
    pub value: ChannelRange,
}

impl ColorBounds {
    pub fn from_entry(entry: &PaletteEntry) -> Self {
        let (m, s) = (entry.mean, entry.std_dev);
        Self {
            hue: HueRange::new(m.h - s.h, m.h + s.h),
            saturation: ChannelRange::new(m.s - s.s, m.s + s.s),
            value: ChannelRange::new(m.v - s.v, m.v + s.v),
        }
    }

    pub fn contains(&self, color: &HsvPolar) -> bool {
        self.hue.contains(color.h) && self.saturation.contains(color.s) && self.value.contains(color.v)
    }
}

/// Binary mask (0 / 255) of the pixels matching any palette entry.
pub fn apply_palette(image: &RgbImage, palette: &Palette) -> GrayImage {
    let bounds: Vec<ColorBounds> = palette.iter().map(ColorBounds::from_entry).collect();

    let mut mask = GrayImage::new(image.width(), image.height());
    let mut selected = 0usize;
    for (out, &pixel) in mask.pixels_mut().zip(image.pixels()) {
        let color = HsvPolar::from_rgb(pixel);
        if bounds.iter().any(|b| b.contains(&color)) {
            *out = Luma([MASK_ON]);
            selected += 1;
        }
    }

    debug!(
        "palette of {} entries selected {selected} pixels",
        bounds.len()
    );
    mask
}
