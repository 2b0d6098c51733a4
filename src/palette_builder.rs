//! Learns a color palette from training images.
//!
//! Steps performed by [`PaletteBuilder::build`]:
//! 1. Every training image is reduced to a small fixed grid (5×5 by default),
//!    so each image contributes the same number of samples and the palette
//!    follows regional tone rather than pixel noise.
//! 2. Sampled pixels are pooled in Cartesian HSV form, with their polar form
//!    kept in the same order.
//! 3. A bandwidth is estimated from the pool and mean-shift clustering runs
//!    on the Cartesian samples.
//! 4. Every cluster becomes one palette entry: mean and standard deviation of
//!    its members' polar values, with hue averaged on the circle.

use image::imageops::{self, FilterType};
use image::DynamicImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::color::{hsv_samples, require_rgb, HsvCartesian, HsvPolar, FULL_TURN};
use crate::config::PaletteConfig;
use crate::error::{PipelineError, Result};
use crate::mean_shift::{estimate_bandwidth, MeanShift, Point3};

/// Mean and standard deviation of one color cluster, in polar HSV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub mean: HsvPolar,
    pub std_dev: HsvPolar,
}

impl PaletteEntry {
    pub fn new(mean: HsvPolar, std_dev: HsvPolar) -> Result<Self> {
        let entry = Self { mean, std_dev };
        entry.validate()?;
        Ok(entry)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in ["m0", "m1", "m2"].iter().zip(self.mean.channels()) {
            if !value.is_finite() {
                return Err(PipelineError::invalid_parameter(*name, value));
            }
        }
        for (name, value) in ["std0", "std1", "std2"].iter().zip(self.std_dev.channels()) {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PipelineError::invalid_parameter(*name, value));
            }
        }
        Ok(())
    }
}

/// Ordered color summaries, one per discovered cluster.
///
/// Entries can only be set at construction and at least one is required;
/// detection borrows the palette immutably and may share it across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PaletteEntry>", into = "Vec<PaletteEntry>")]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    pub fn new(entries: Vec<PaletteEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(PipelineError::EmptyPalette);
        }
        for entry in &entries {
            entry.validate()?;
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PaletteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<PaletteEntry>> for Palette {
    type Error = PipelineError;

    fn try_from(entries: Vec<PaletteEntry>) -> Result<Self> {
        Palette::new(entries)
    }
}

impl From<Palette> for Vec<PaletteEntry> {
    fn from(palette: Palette) -> Self {
        palette.entries
    }
}

impl<'a> IntoIterator for &'a Palette {
    type Item = &'a PaletteEntry;
    type IntoIter = std::slice::Iter<'a, PaletteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ------------------------------------------------------------
// Running per-channel statistics
// ------------------------------------------------------------

/// Welford accumulator: constant inputs give an exact mean and zero spread.
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    count: usize,
    mean: [f64; 2],
    m2: [f64; 2],
}

impl RunningStats {
    fn push(&mut self, values: [f64; 2]) {
        self.count += 1;
        let n = self.count as f64;
        for c in 0..2 {
            let delta = values[c] - self.mean[c];
            self.mean[c] += delta / n;
            self.m2[c] += delta * (values[c] - self.mean[c]);
        }
    }

    /// Sample standard deviation (n - 1); zero for fewer than two values.
    fn std_dev(&self) -> [f64; 2] {
        if self.count < 2 {
            return [0.0; 2];
        }
        let denom = (self.count - 1) as f64;
        self.m2.map(|m2| (m2.max(0.0) / denom).sqrt())
    }
}

/// Signed difference in degrees, folded into `(-180, 180]`.
fn angle_diff(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(FULL_TURN);
    if d > FULL_TURN / 2.0 { d - FULL_TURN } else { d }
}

/// Circular mean and deviation of hue angles.
///
/// Angles are taken relative to the first one pushed, so a cluster
/// straddling 0° averages to a hue near 0° rather than near 180°, and
/// constant input keeps its exact hue with zero spread.
#[derive(Debug, Clone, Default)]
struct HueStats {
    reference: Option<f64>,
    offsets: Vec<f64>,
}

impl HueStats {
    fn push(&mut self, hue: f64) {
        let reference = *self.reference.get_or_insert(hue);
        self.offsets.push(angle_diff(hue, reference));
    }

    /// `(mean, deviation)` in degrees; the deviation uses n - 1 and is zero
    /// for fewer than two angles.
    fn summary(&self) -> (f64, f64) {
        let Some(reference) = self.reference else {
            return (0.0, 0.0);
        };
        let (sin, cos) = self
            .offsets
            .iter()
            .map(|d| d.to_radians().sin_cos())
            .fold((0.0, 0.0), |(s, c), (ds, dc)| (s + ds, c + dc));
        let mean_offset = sin.atan2(cos).to_degrees();
        let mean = (reference + mean_offset).rem_euclid(FULL_TURN);

        let n = self.offsets.len();
        if n < 2 {
            return (mean, 0.0);
        }
        let sum_sq: f64 = self
            .offsets
            .iter()
            .map(|&d| angle_diff(d, mean_offset).powi(2))
            .sum();
        (mean, (sum_sq / (n - 1) as f64).sqrt())
    }
}

/// Statistics of one cluster: circular for hue, linear for saturation and
/// value.
#[derive(Debug, Clone, Default)]
struct ClusterStats {
    hue: HueStats,
    linear: RunningStats,
}

impl ClusterStats {
    fn push(&mut self, color: &HsvPolar) {
        self.hue.push(color.h);
        self.linear.push([color.s, color.v]);
    }

    fn count(&self) -> usize {
        self.linear.count
    }

    fn entry(&self) -> PaletteEntry {
        let (mh, sh) = self.hue.summary();
        let [ms, mv] = self.linear.mean;
        let [ss, sv] = self.linear.std_dev();
        PaletteEntry {
            mean: HsvPolar::new(mh, ms, mv),
            std_dev: HsvPolar::new(sh, ss, sv),
        }
    }
}

// ------------------------------------------------------------
// Sample pooling
// ------------------------------------------------------------

/// Accumulates training samples and turns them into a [`Palette`].
///
/// Builders fed with disjoint image sets can be merged; merging in input
/// order reproduces the sequential pool exactly.
#[derive(Debug, Clone)]
pub struct PaletteBuilder {
    config: PaletteConfig,
    cartesian: Vec<HsvCartesian>,
    polar: Vec<HsvPolar>,
    images: usize,
}

impl PaletteBuilder {
    pub fn new(config: PaletteConfig) -> Self {
        Self {
            config,
            cartesian: Vec::new(),
            polar: Vec::new(),
            images: 0,
        }
    }

    pub fn config(&self) -> &PaletteConfig {
        &self.config
    }

    pub fn sample_count(&self) -> usize {
        self.cartesian.len()
    }

    pub fn image_count(&self) -> usize {
        self.images
    }

    /// Samples one training image on the configured grid.
    pub fn add_image(&mut self, image: &DynamicImage) -> Result<()> {
        let rgb = require_rgb(image)?;
        let grid = self.config.sample_grid;

        // Fast path – no resampling required.
        let sampled = if rgb.dimensions() == (grid, grid) {
            rgb
        } else {
            imageops::resize(&rgb, grid, grid, FilterType::Triangle)
        };

        let (polar, cartesian) = hsv_samples(&sampled);
        self.polar.extend(polar);
        self.cartesian.extend(cartesian);
        self.images += 1;
        Ok(())
    }

    /// Appends the samples of `other` after this builder's samples.
    pub fn merge(mut self, other: PaletteBuilder) -> Self {
        self.cartesian.extend(other.cartesian);
        self.polar.extend(other.polar);
        self.images += other.images;
        self
    }

    pub fn build(&self) -> Result<Palette> {
        self.config.validate()?;
        if self.cartesian.is_empty() {
            return Err(PipelineError::EmptySamplePool);
        }

        let points: Vec<Point3> = self.cartesian.iter().map(|c| c.to_array()).collect();

        let estimated = estimate_bandwidth(&points, self.config.quantile)?;
        let bandwidth = if estimated < self.config.min_bandwidth {
            warn!(
                "estimated bandwidth {estimated:.5} below floor, using {:.5}",
                self.config.min_bandwidth
            );
            self.config.min_bandwidth
        } else {
            estimated
        };

        let clustering = MeanShift::new(bandwidth)?
            .max_iterations(self.config.max_iterations)
            .cluster_all(self.config.cluster_all)
            .fit(&points)?;

        let labels = clustering.distinct_labels();
        if labels.is_empty() {
            return Err(PipelineError::NoClusters {
                samples: points.len(),
            });
        }

        let entries: Vec<PaletteEntry> = labels
            .iter()
            .map(|&label| {
                let mut stats = ClusterStats::default();
                for i in clustering.members(label) {
                    stats.push(&self.polar[i]);
                }
                debug!("cluster {label}: {} members", stats.count());
                stats.entry()
            })
            .collect();

        info!(
            "palette of {} colors from {} samples ({} images, bandwidth {bandwidth:.4})",
            entries.len(),
            points.len(),
            self.images
        );
        Palette::new(entries)
    }
}

/// Builds a palette from decoded training images.
pub fn build_palette(images: &[DynamicImage], config: &PaletteConfig) -> Result<Palette> {
    let mut builder = PaletteBuilder::new(config.clone());
    for image in images {
        builder.add_image(image)?;
    }
    builder.build()
}
