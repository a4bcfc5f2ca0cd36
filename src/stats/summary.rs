//! Descriptive statistics and empirical density of a sample.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

/// Number of histogram bins used for empirical densities.
pub const HISTOGRAM_BINS: usize = 30;

/// Descriptive statistics of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n − 1 denominator).
    pub sd: f64,
    pub skewness: f64,
    /// Excess kurtosis.
    pub kurtosis: f64,
    pub min: f64,
    pub max: f64,
}

impl DescriptiveStats {
    /// Summarizes `values`; `None` for an empty sample.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = Statistics::mean(values.iter());
        let sd = if values.len() > 1 {
            Statistics::std_dev(values.iter())
        } else {
            0.0
        };

        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for v in values {
            let d = v - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }
        m2 /= n;
        m3 /= n;
        m4 /= n;
        let (skewness, kurtosis) = if m2 > 0.0 {
            (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
        } else {
            (0.0, 0.0)
        };

        Some(Self {
            count: values.len(),
            mean,
            median: Data::new(values.to_vec()).median(),
            sd,
            skewness,
            kurtosis,
            min: Statistics::min(values.iter()),
            max: Statistics::max(values.iter()),
        })
    }
}

/// One bin of an empirical density histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityBin {
    pub lower: f64,
    pub upper: f64,
    /// Fraction of the sample in the bin divided by the bin width.
    pub density: f64,
}

impl DensityBin {
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }
}

/// Equal-width density histogram over `[min, max]`.
///
/// A constant sample yields one zero-width bin with density 0.
pub fn histogram(values: &[f64], bins: usize) -> Vec<DensityBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = Statistics::min(values.iter());
    let max = Statistics::max(values.iter());
    let n = values.len() as f64;
    if max <= min {
        return vec![DensityBin {
            lower: min,
            upper: max,
            density: 0.0,
        }];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0_usize; bins];
    for v in values {
        let i = (((v - min) / width) as usize).min(bins - 1);
        counts[i] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| DensityBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            density: c as f64 / (n * width),
        })
        .collect()
}
