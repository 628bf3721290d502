use serde::{Deserialize, Serialize};

/// Summary of timing samples in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
    pub cv_percent: f64,
    pub sample_count: usize,
    pub outliers_removed: usize,
}

impl Stats {
    /// Summarize `samples`, dropping values outside [Q1 - 1.5*IQR, Q3 + 1.5*IQR]
    /// as long as at least two samples remain.
    pub fn from_samples(samples: &[f64]) -> Self {
        match samples {
            [] => Stats::default(),
            [only] => Stats {
                mean: *only,
                median: *only,
                min: *only,
                max: *only,
                sample_count: 1,
                ..Stats::default()
            },
            _ => {
                let mut sorted = samples.to_vec();
                sorted.sort_by(f64::total_cmp);

                let q1 = percentile(&sorted, 25.0);
                let q3 = percentile(&sorted, 75.0);
                let fence = 1.5 * (q3 - q1);
                let kept: Vec<f64> = sorted
                    .iter()
                    .copied()
                    .filter(|&v| v >= q1 - fence && v <= q3 + fence)
                    .collect();

                let data = if kept.len() >= 2 { &kept } else { &sorted };
                let n = data.len() as f64;
                let mean = data.iter().sum::<f64>() / n;
                let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                let stddev = variance.sqrt();

                Stats {
                    mean,
                    median: median(data),
                    min: data[0],
                    max: data[data.len() - 1],
                    stddev,
                    cv_percent: if mean > 0.0 { stddev / mean * 100.0 } else { 0.0 },
                    sample_count: data.len(),
                    outliers_removed: samples.len() - data.len(),
                }
            }
        }
    }
}

/// Elements per second, in millions, for `n` elements sorted in `ms`.
pub fn melem_per_sec(n: usize, ms: f64) -> f64 {
    if ms > 0.0 {
        n as f64 / (ms * 1e3)
    } else {
        0.0
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Linear-interpolated percentile (0-100) of a sorted, non-empty slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] * (1.0 - frac) + sorted[upper] * frac
}
