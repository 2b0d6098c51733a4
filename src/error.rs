//! Error types for palette construction and flower detection.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input image does not carry exactly three color channels.
    #[error("expected 3 color channels, found {found}")]
    ChannelCount { found: u8 },

    /// The input image has no pixels.
    #[error("image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// A raw pixel buffer does not match its declared dimensions.
    #[error("buffer of {actual} bytes does not hold a {width}x{height} image with {channels} channels")]
    BufferSize {
        width: u32,
        height: u32,
        channels: u8,
        actual: usize,
    },

    /// Palette construction was asked to cluster zero samples.
    #[error("no training samples were collected")]
    EmptySamplePool,

    /// Clustering finished without a single non-outlier cluster.
    #[error("clustering {samples} samples produced no clusters")]
    NoClusters { samples: usize },

    /// A palette without entries cannot select anything.
    #[error("palette has no entries")]
    EmptyPalette,

    #[error("invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// A palette exchange file could not be parsed.
    #[error("palette format error on line {line}: {message}")]
    PaletteFormat { line: usize, message: String },

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Several batch inputs would be written to the same output file.
    #[error("output {} is shared by several inputs", path.display())]
    DuplicateOutput { path: PathBuf },

    /// Failure while processing one input file.
    #[error("{}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn for_input(path: impl Into<PathBuf>, source: PipelineError) -> Self {
        Self::Input {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        Self::PaletteFormat {
            line,
            message: message.into(),
        }
    }
}
