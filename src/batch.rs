//! File-level drivers for both pipelines.
//!
//! Work is spread over a bounded rayon pool. Training files are sampled
//! independently and merged back in input order, so the palette matches a
//! sequential build. Detection shares one immutable palette across workers;
//! a failing file is reported in its own outcome and never stops the rest.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{error, info};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config::{DetectionConfig, PaletteConfig};
use crate::detect::FlowerLocator;
use crate::error::{PipelineError, Result};
use crate::palette_builder::{Palette, PaletteBuilder};

fn thread_pool(threads: Option<usize>) -> Result<ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        if n == 0 {
            return Err(PipelineError::invalid_parameter("threads", n));
        }
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| PipelineError::invalid_parameter("threads", e))
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| PipelineError::for_input(path, e.into()))
}

/// Samples every training file and returns the merged pool.
pub fn pool_training_images(
    paths: &[PathBuf],
    config: &PaletteConfig,
    threads: Option<usize>,
) -> Result<PaletteBuilder> {
    let pool = thread_pool(threads)?;
    pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let mut builder = PaletteBuilder::new(config.clone());
                let image = load_image(path)?;
                builder
                    .add_image(&image)
                    .map_err(|e| PipelineError::for_input(path, e))?;
                Ok(builder)
            })
            .try_reduce(|| PaletteBuilder::new(config.clone()), |a, b| Ok(a.merge(b)))
    })
}

/// Builds a palette from training files.
pub fn generate_palette(paths: &[PathBuf], config: &PaletteConfig, threads: Option<usize>) -> Result<Palette> {
    pool_training_images(paths, config, threads)?.build()
}

/// A successfully annotated file.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedImage {
    pub output: PathBuf,
    pub contours: usize,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub input: PathBuf,
    pub result: Result<LocatedImage>,
}

/// Number of inputs sharing each file name.
fn name_counts(inputs: &[PathBuf]) -> HashMap<&OsStr, usize> {
    let mut counts = HashMap::new();
    for name in inputs.iter().filter_map(|input| input.file_name()) {
        *counts.entry(name).or_insert(0) += 1;
    }
    counts
}

fn locate_one(
    locator: &FlowerLocator<'_>,
    input: &Path,
    out_dir: &Path,
    names: &HashMap<&OsStr, usize>,
) -> Result<LocatedImage> {
    let name = input
        .file_name()
        .ok_or_else(|| PipelineError::invalid_parameter("input", input.display()))?;
    let output = out_dir.join(name);
    if names.get(name).copied().unwrap_or(0) > 1 {
        return Err(PipelineError::DuplicateOutput { path: output });
    }

    let image = load_image(input)?;
    let detection = locator.locate(&image)?;

    detection.annotated.save(&output)?;
    Ok(LocatedImage {
        output,
        contours: detection.contours.len(),
    })
}

/// Annotates every input file, writing each result into `out_dir` under the
/// input's file name. Outcomes are returned in input order. Inputs whose file
/// names collide are all reported as failed and nothing is written for them.
pub fn locate_batch(
    inputs: &[PathBuf],
    palette: &Palette,
    config: &DetectionConfig,
    out_dir: &Path,
    threads: Option<usize>,
) -> Result<Vec<BatchOutcome>> {
    config.validate()?;
    fs::create_dir_all(out_dir).map_err(|e| PipelineError::io(out_dir, e))?;
    let pool = thread_pool(threads)?;
    let locator = FlowerLocator::new(palette, config.clone());
    let names = name_counts(inputs);

    let outcomes: Vec<BatchOutcome> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| {
                let result = locate_one(&locator, input, out_dir, &names).map_err(|e| match e {
                    PipelineError::Input { .. } => e,
                    other => PipelineError::for_input(input, other),
                });
                if let Err(e) = &result {
                    error!("{e}");
                }
                BatchOutcome {
                    input: input.clone(),
                    result,
                }
            })
            .collect()
    });

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(
        "located flowers in {} of {} images",
        outcomes.len() - failed,
        outcomes.len()
    );
    Ok(outcomes)
}
