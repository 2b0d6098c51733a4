//! Density mode-seeking (mean-shift) clustering over 3-D points.
//!
//! Every sample seeds a flat-kernel shift: the point is repeatedly replaced
//! by the mean of all samples within `bandwidth` until it stops moving. Seeds
//! that reach the same density mode form one cluster, so the cluster count
//! follows the data instead of being fixed up front.

use std::cmp::Ordering;

use log::debug;

use crate::error::{PipelineError, Result};

pub type Point3 = [f64; 3];

/// Fraction of the bandwidth a seed may still move and count as converged.
const CONVERGENCE_FRACTION: f64 = 1e-3;

#[inline]
fn distance_sq(a: &Point3, b: &Point3) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Mean distance from each sample to its k-th nearest sample, where
/// `k = max(1, floor(n * quantile))` and a sample is its own first
/// neighbour.
pub fn estimate_bandwidth(samples: &[Point3], quantile: f64) -> Result<f64> {
    if samples.is_empty() {
        return Err(PipelineError::EmptySamplePool);
    }
    if !(quantile > 0.0 && quantile <= 1.0) {
        return Err(PipelineError::invalid_parameter("quantile", quantile));
    }

    let n = samples.len();
    let k = ((n as f64 * quantile) as usize).clamp(1, n);

    let mut distances = vec![0.0; n];
    let mut total = 0.0;
    for sample in samples {
        for (slot, other) in distances.iter_mut().zip(samples) {
            *slot = distance_sq(sample, other);
        }
        let (_, kth, _) = distances.select_nth_unstable_by(k - 1, f64::total_cmp);
        total += kth.sqrt();
    }

    let bandwidth = total / n as f64;
    debug!("bandwidth estimate {bandwidth:.5} from {n} samples (k = {k})");
    Ok(bandwidth)
}

/// Outcome of a clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    centers: Vec<Point3>,
    labels: Vec<Option<usize>>,
}

impl Clustering {
    /// Surviving modes, strongest first. Label `i` refers to `centers()[i]`.
    pub fn centers(&self) -> &[Point3] {
        &self.centers
    }

    /// One entry per input sample; `None` marks an outlier.
    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }

    /// Distinct non-outlier labels in ascending order.
    pub fn distinct_labels(&self) -> Vec<usize> {
        let mut seen = vec![false; self.centers.len()];
        for &label in self.labels.iter().flatten() {
            if let Some(slot) = seen.get_mut(label) {
                *slot = true;
            }
        }
        seen.iter()
            .enumerate()
            .filter_map(|(label, &used)| used.then_some(label))
            .collect()
    }

    pub fn cluster_count(&self) -> usize {
        self.distinct_labels().len()
    }

    pub fn outlier_count(&self) -> usize {
        self.labels.iter().filter(|label| label.is_none()).count()
    }

    /// Indices of the samples carrying `label`.
    pub fn members(&self, label: usize) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter_map(move |(i, l)| (*l == Some(label)).then_some(i))
    }
}

#[derive(Debug, Clone)]
pub struct MeanShift {
    bandwidth: f64,
    max_iterations: usize,
    cluster_all: bool,
}

impl MeanShift {
    pub fn new(bandwidth: f64) -> Result<Self> {
        if !(bandwidth > 0.0 && bandwidth.is_finite()) {
            return Err(PipelineError::invalid_parameter("bandwidth", bandwidth));
        }
        Ok(Self {
            bandwidth,
            max_iterations: 300,
            cluster_all: true,
        })
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn cluster_all(mut self, cluster_all: bool) -> Self {
        self.cluster_all = cluster_all;
        self
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Shifts a single seed until it settles. Returns the mode and the number
    /// of samples inside the kernel there.
    fn climb(&self, seed: Point3, samples: &[Point3]) -> Option<(Point3, usize)> {
        let radius_sq = self.bandwidth * self.bandwidth;
        let stop_sq = (CONVERGENCE_FRACTION * self.bandwidth).powi(2);
        let mut mean = seed;

        for iteration in 0..self.max_iterations {
            let mut sum = [0.0; 3];
            let mut count = 0usize;
            for sample in samples {
                if distance_sq(sample, &mean) <= radius_sq {
                    sum[0] += sample[0];
                    sum[1] += sample[1];
                    sum[2] += sample[2];
                    count += 1;
                }
            }
            if count == 0 {
                return None;
            }

            let previous = mean;
            let n = count as f64;
            mean = [sum[0] / n, sum[1] / n, sum[2] / n];

            if distance_sq(&mean, &previous) <= stop_sq || iteration + 1 == self.max_iterations {
                return Some((mean, count));
            }
        }
        None
    }

    pub fn fit(&self, samples: &[Point3]) -> Result<Clustering> {
        if samples.is_empty() {
            return Err(PipelineError::EmptySamplePool);
        }

        // 1. Climb from every sample, merging seeds that land on the same mode.
        let mut modes: Vec<(Point3, usize)> = Vec::new();
        for &seed in samples {
            if let Some((mode, support)) = self.climb(seed, samples) {
                match modes.iter_mut().find(|(m, _)| *m == mode) {
                    Some(existing) => existing.1 = existing.1.max(support),
                    None => modes.push((mode, support)),
                }
            }
        }

        // 2. Strongest modes first; ties broken on coordinates so the order
        //    never depends on seed order.
        modes.sort_by(|(a, support_a), (b, support_b)| {
            support_b.cmp(support_a).then_with(|| {
                a.iter()
                    .zip(b)
                    .map(|(x, y)| y.total_cmp(x))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            })
        });

        // 3. Suppress modes within the bandwidth of a stronger one.
        let radius_sq = self.bandwidth * self.bandwidth;
        let mut keep = vec![true; modes.len()];
        for i in 0..modes.len() {
            if !keep[i] {
                continue;
            }
            for j in (i + 1)..modes.len() {
                if keep[j] && distance_sq(&modes[i].0, &modes[j].0) <= radius_sq {
                    keep[j] = false;
                }
            }
        }
        let centers: Vec<Point3> = modes
            .iter()
            .zip(&keep)
            .filter_map(|((mode, _), &k)| k.then_some(*mode))
            .collect();

        // 4. Nearest surviving mode per sample.
        let labels = samples
            .iter()
            .map(|sample| {
                let mut best: Option<(usize, f64)> = None;
                for (label, center) in centers.iter().enumerate() {
                    let d = distance_sq(sample, center);
                    if best.is_none_or(|(_, best_d)| d < best_d) {
                        best = Some((label, d));
                    }
                }
                best.and_then(|(label, d)| {
                    (self.cluster_all || d <= radius_sq).then_some(label)
                })
            })
            .collect();

        let clustering = Clustering { centers, labels };
        debug!(
            "mean-shift: {} samples -> {} modes ({} suppressed), {} outliers",
            samples.len(),
            clustering.centers.len(),
            modes.len() - clustering.centers.len(),
            clustering.outlier_count()
        );
        Ok(clustering)
    }
}
