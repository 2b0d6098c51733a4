//! Tunable parameters for palette construction and detection.
//!
//! Every value has a default matching the tuned pipeline; a JSON file may
//! override any subset of them:
//!
//! ```no_run
//! use pharm_drone::config::Config;
//! use std::path::Path;
//!
//! let config = Config::from_json_file(Path::new("pharm-drone.json"))?;
//! assert_eq!(config.palette.sample_grid, 5);
//! # Ok::<(), pharm_drone::PipelineError>(())
//! ```

use std::fs;
use std::path::Path;

use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Complete configuration for both pipelines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub palette: PaletteConfig,
    pub detection: DetectionConfig,
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.palette.validate()?;
        self.detection.validate()
    }
}

/// Parameters of the palette builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    /// Side of the square grid each training image is resampled to.
    pub sample_grid: u32,
    /// Fraction of the pool used as neighbour count in bandwidth estimation.
    pub quantile: f64,
    /// Lower bound applied to the estimated bandwidth.
    pub min_bandwidth: f64,
    /// Iteration cap for a single mean-shift seed.
    pub max_iterations: usize,
    /// Label every sample with its nearest mode, even when it lies outside
    /// the bandwidth of all modes.
    pub cluster_all: bool,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            sample_grid: 5,
            quantile: 0.05,
            min_bandwidth: 0.05,
            max_iterations: 300,
            cluster_all: true,
        }
    }
}

impl PaletteConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_grid == 0 {
            return Err(PipelineError::invalid_parameter("sample_grid", self.sample_grid));
        }
        if !(self.quantile > 0.0 && self.quantile <= 1.0) {
            return Err(PipelineError::invalid_parameter("quantile", self.quantile));
        }
        if !(self.min_bandwidth > 0.0 && self.min_bandwidth.is_finite()) {
            return Err(PipelineError::invalid_parameter("min_bandwidth", self.min_bandwidth));
        }
        if self.max_iterations == 0 {
            return Err(PipelineError::invalid_parameter("max_iterations", self.max_iterations));
        }
        Ok(())
    }
}

/// Shape of the structuring element used by every morphology step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementShape {
    /// Full square of side `2 * radius + 1`.
    Rect,
    /// Diamond (4-connected cross for radius 1).
    Cross,
}

/// Structuring element passed explicitly to each dilation/erosion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuringElement {
    pub shape: ElementShape,
    pub radius: u8,
}

impl Default for StructuringElement {
    /// 3×3 rectangle.
    fn default() -> Self {
        Self {
            shape: ElementShape::Rect,
            radius: 1,
        }
    }
}

impl StructuringElement {
    pub(crate) fn norm(&self) -> Norm {
        match self.shape {
            ElementShape::Rect => Norm::LInf,
            ElementShape::Cross => Norm::L1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Side of the Gaussian blur kernel applied before Canny; must be odd.
    pub blur_kernel: u32,
    /// Low Canny threshold as a fraction of the median intensity.
    pub low_ratio: f32,
    /// High Canny threshold as a fraction of the median intensity.
    pub high_ratio: f32,
    pub dilate_iterations: u32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 7,
            low_ratio: 0.67,
            high_ratio: 1.33,
            dilate_iterations: 1,
        }
    }
}

/// Iteration counts of the dilate → erode → dilate cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub merge_dilations: u32,
    pub erosions: u32,
    pub grow_dilations: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            merge_dilations: 4,
            erosions: 5,
            grow_dilations: 7,
        }
    }
}

/// How detected contours are drawn on the output image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourStyle {
    /// Highlight color in RGB order.
    pub color: [u8; 3],
    pub stroke_width: u32,
}

impl Default for ContourStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 0],
            stroke_width: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub element: StructuringElement,
    pub edges: EdgeConfig,
    pub noise: NoiseConfig,
    pub contour: ContourStyle,
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        let edges = &self.edges;
        if edges.blur_kernel == 0 || edges.blur_kernel % 2 == 0 {
            return Err(PipelineError::invalid_parameter("blur_kernel", edges.blur_kernel));
        }
        if !(edges.low_ratio > 0.0 && edges.low_ratio.is_finite()) {
            return Err(PipelineError::invalid_parameter("low_ratio", edges.low_ratio));
        }
        if !(edges.high_ratio >= edges.low_ratio && edges.high_ratio.is_finite()) {
            return Err(PipelineError::invalid_parameter("high_ratio", edges.high_ratio));
        }
        if self.element.radius == 0 {
            return Err(PipelineError::invalid_parameter("element.radius", self.element.radius));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "palette": { "quantile": 0.1 }, "detection": { "noise": { "erosions": 6 } } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.palette.quantile, 0.1);
        assert_eq!(config.palette.sample_grid, 5);
        assert_eq!(config.detection.noise.erosions, 6);
        assert_eq!(config.detection.noise.merge_dilations, 4);
        assert_eq!(config.detection.element, StructuringElement::default());
    }

    #[test]
    fn element_shape_is_lowercase_in_json() {
        let element: StructuringElement =
            serde_json::from_str(r#"{ "shape": "cross", "radius": 2 }"#).unwrap();
        assert_eq!(element.shape, ElementShape::Cross);
        assert_eq!(element.radius, 2);
    }

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_detection_settings() {
        let mut config = DetectionConfig::default();
        config.edges.blur_kernel = 6;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidParameter { parameter, .. }) if parameter == "blur_kernel"
        ));

        let mut config = DetectionConfig::default();
        config.edges.low_ratio = 0.0;
        assert!(config.validate().is_err());

        let mut config = DetectionConfig::default();
        config.edges.high_ratio = 0.5;
        assert!(config.validate().is_err());

        let mut config = DetectionConfig::default();
        config.element.radius = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loading_checks_detection_settings() {
        let dir = std::env::temp_dir().join(format!("pharm_drone_config_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("even_kernel.json");
        fs::write(&path, r#"{ "detection": { "edges": { "blur_kernel": 4 } } }"#).unwrap();

        let result = Config::from_json_file(&path);
        let _ = fs::remove_dir_all(&dir);

        assert!(matches!(
            result,
            Err(PipelineError::InvalidParameter { parameter, .. }) if parameter == "blur_kernel"
        ));
    }

    #[test]
    fn rejects_out_of_range_quantile() {
        let config = PaletteConfig {
            quantile: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidParameter { .. })
        ));
    }
}
