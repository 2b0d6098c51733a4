//! External contour extraction and drawing.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::config::ContourStyle;

/// Boundary of one connected mask region, in tracing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<(i32, i32)>,
}

impl Contour {
    /// Inclusive `(min_x, min_y, max_x, max_y)`, or `None` for an empty contour.
    pub fn bounding_box(&self) -> Option<(i32, i32, i32, i32)> {
        let (&(x0, y0), rest) = self.points.split_first()?;
        Some(rest.iter().fold((x0, y0, x0, y0), |(min_x, min_y, max_x, max_y), &(x, y)| {
            (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
        }))
    }
}

/// Outermost boundaries of the non-zero regions of `mask`. Holes, and any
/// region nested inside a hole, are dropped.
pub fn external_contours(mask: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| Contour {
            points: c.points.iter().map(|p| (p.x, p.y)).collect(),
        })
        .collect()
}

/// Draws every contour onto `canvas` as a closed polyline.
pub fn draw_contours(canvas: &mut RgbImage, contours: &[Contour], style: &ContourStyle) {
    let color = Rgb(style.color);
    let radius = (style.stroke_width / 2) as i32;

    for contour in contours {
        let Some(&first) = contour.points.first() else {
            continue;
        };
        let mut previous = first;
        for &point in contour.points.iter().skip(1).chain(std::iter::once(&first)) {
            draw_line_segment_mut(
                canvas,
                (previous.0 as f32, previous.1 as f32),
                (point.0 as f32, point.1 as f32),
                color,
            );
            previous = point;
        }
        if radius > 0 {
            for &point in &contour.points {
                draw_filled_circle_mut(canvas, point, radius, color);
            }
        }
    }
}

/// Result of one detection run.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Copy of the original image with contours drawn on it.
    pub annotated: RgbImage,
    pub contours: Vec<Contour>,
}

/// Extracts external contours from `mask` and draws them on a copy of the
/// unmasked `original`.
pub fn detect_and_draw(original: &RgbImage, mask: &GrayImage, style: &ContourStyle) -> Detection {
    let contours = external_contours(mask);
    let mut annotated = original.clone();
    draw_contours(&mut annotated, &contours, style);
    Detection { annotated, contours }
}
