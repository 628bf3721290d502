//! Measurement harness: builds a sort session per size, validates it
//! against the host sort, then runs warmup + measured loops.

use serde::{Deserialize, Serialize};

use forge_bitonic::SortOrder;

use crate::cli::BenchMode;
use crate::stats::Stats;

/// One benchmarked size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    pub mode: String,
    pub order: String,
    pub size: usize,
    pub padded_size: usize,
    pub workgroup_size: usize,
    pub pass_count: usize,
    pub validated: bool,
    pub gpu_stats: Stats,
    pub cpu_stats: Stats,
    pub speedup: f64,
    pub gpu_melem_per_sec: f64,
}

/// Configuration for a benchmark run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub sizes: Vec<usize>,
    pub runs: u32,
    pub warmup: u32,
    pub order: SortOrder,
    pub mode: BenchMode,
    pub max_workgroup_size: Option<usize>,
}

/// Host reference: `sort_unstable`, reversed for descending order.
pub fn host_sort(data: &[u32], order: SortOrder) -> Vec<u32> {
    let mut sorted = data.to_vec();
    sorted.sort_unstable();
    if order == SortOrder::Descending {
        sorted.reverse();
    }
    sorted
}

/// Check that `indices` is a permutation of `0..data.len()` that orders `data`
/// like `expected`.
pub fn indices_match(data: &[u32], indices: &[u32], expected: &[u32]) -> bool {
    if indices.len() != data.len() {
        return false;
    }
    let mut seen = vec![false; data.len()];
    for &i in indices {
        match seen.get_mut(i as usize) {
            Some(s) if !*s => *s = true,
            _ => return false,
        }
    }
    indices
        .iter()
        .zip(expected)
        .all(|(&i, &e)| data[i as usize] == e)
}

/// Format a size number for display (e.g., 1000000 -> "1M").
pub fn format_size(size: usize) -> String {
    if size >= 1_000_000 && size % 1_000_000 == 0 {
        format!("{}M", size / 1_000_000)
    } else if size >= 1_000 && size % 1_000 == 0 {
        format!("{}K", size / 1_000)
    } else {
        format!("{}", size)
    }
}

#[cfg(target_os = "macos")]
pub use gpu::run_sizes;

#[cfg(target_os = "macos")]
mod gpu {
    use std::time::Instant;

    use forge_bitonic::metal_helpers::{read_buffer_slice, write_buffer};
    use forge_bitonic::{
        PassPlan, Result, Scalar, SortConfig, SortContext, SortPlan, TypeDescriptor,
    };

    use super::{format_size, host_sort, indices_match, BenchConfig, DataPoint};
    use crate::cli::BenchMode;
    use crate::data_gen::DataGenerator;
    use crate::stats::{melem_per_sec, Stats};

    fn elapsed_ms(start: Instant) -> f64 {
        start.elapsed().as_secs_f64() * 1e3
    }

    /// Run the configured session kind across all sizes.
    ///
    /// For each size:
    /// 1. build the session
    /// 2. sort once and compare with the host sort
    /// 3. warmup loop (discard timings)
    /// 4. measured loop (GPU `sort_and_wait`, then host `sort_unstable`)
    pub fn run_sizes(
        ctx: &SortContext,
        config: &BenchConfig,
        progress_cb: Option<&dyn Fn(&str)>,
    ) -> Result<Vec<DataPoint>> {
        let mut gen = DataGenerator::new(42);
        let mut results = Vec::with_capacity(config.sizes.len());

        for &size in &config.sizes {
            let label = format_size(size);
            let report = |stage: &str| {
                if let Some(cb) = progress_cb {
                    cb(&format!("{} @ {}: {}", config.mode.name(), label, stage));
                }
            };

            report("setup");
            let data = gen.uniform_u32(size);
            let expected = host_sort(&data, config.order);
            let buffer = ctx.alloc_buffer_with_data(&data)?;
            let mut session_config =
                SortConfig::new(TypeDescriptor::natural(Scalar::UInt), size, buffer.clone())
                    .order(config.order);
            if let Some(max) = config.max_workgroup_size {
                session_config = session_config.max_workgroup_size(max);
            }

            // Each `run` performs one complete GPU sort of the original data.
            let (plan, passes, validated, gpu_times) = match config.mode {
                BenchMode::InPlace => {
                    let sorter = ctx.create_in_place_sorter(session_config)?;
                    let reset = || {
                        // SAFETY: the previous sort_and_wait has completed.
                        unsafe { write_buffer(&buffer, &data) }
                    };

                    sorter.sort_and_wait()?;
                    // SAFETY: sort_and_wait returned; the GPU is idle.
                    let actual: Vec<u32> = unsafe { read_buffer_slice(&buffer, size) };
                    let validated = actual == expected;

                    let mut run = || -> Result<f64> {
                        reset();
                        let start = Instant::now();
                        sorter.sort_and_wait()?;
                        Ok(elapsed_ms(start))
                    };
                    let times = measure(config, &report, &mut run)?;
                    let (plan, passes) = (*sorter.plan(), sorter.passes().clone());
                    sorter.destroy();
                    (plan, passes, validated, times)
                }
                BenchMode::Index => {
                    let sorter = ctx.create_index_sorter(session_config)?;

                    let indices_buf = sorter.sort_and_wait()?;
                    // SAFETY: sort_and_wait returned; the GPU is idle.
                    let indices: Vec<u32> = unsafe { read_buffer_slice(&indices_buf, size) };
                    let validated = indices_match(&data, &indices, &expected);

                    let mut run = || -> Result<f64> {
                        let start = Instant::now();
                        sorter.sort_and_wait()?;
                        Ok(elapsed_ms(start))
                    };
                    let times = measure(config, &report, &mut run)?;
                    let (plan, passes) = (*sorter.plan(), sorter.passes().clone());
                    sorter.destroy();
                    (plan, passes, validated, times)
                }
            };

            if !validated {
                tracing::warn!(size, mode = config.mode.name(), "GPU result differs from host sort");
            }

            report("measuring host sort");
            let cpu_times: Vec<f64> = (0..config.runs)
                .map(|_| {
                    let mut copy = data.clone();
                    let start = Instant::now();
                    copy.sort_unstable();
                    elapsed_ms(start)
                })
                .collect();

            let point = data_point(config, &plan, &passes, validated, &gpu_times, &cpu_times);
            report(&format!("done ({:.1}x)", point.speedup));
            tracing::info!(
                size,
                gpu_ms = point.gpu_stats.mean,
                cpu_ms = point.cpu_stats.mean,
                passes = point.pass_count,
                "measured"
            );
            results.push(point);
        }

        Ok(results)
    }

    fn measure(
        config: &BenchConfig,
        report: &dyn Fn(&str),
        run: &mut dyn FnMut() -> Result<f64>,
    ) -> Result<Vec<f64>> {
        report(&format!("warmup ({} runs)", config.warmup));
        for _ in 0..config.warmup {
            run()?;
        }
        report(&format!("measuring GPU ({} runs)", config.runs));
        (0..config.runs).map(|_| run()).collect()
    }

    fn data_point(
        config: &BenchConfig,
        plan: &SortPlan,
        passes: &PassPlan,
        validated: bool,
        gpu_times: &[f64],
        cpu_times: &[f64],
    ) -> DataPoint {
        let gpu_stats = Stats::from_samples(gpu_times);
        let cpu_stats = Stats::from_samples(cpu_times);
        let speedup = if gpu_stats.mean > 0.0 {
            cpu_stats.mean / gpu_stats.mean
        } else {
            0.0
        };
        DataPoint {
            mode: config.mode.name().to_string(),
            order: config.order.to_string(),
            size: plan.n,
            padded_size: plan.padded_n,
            workgroup_size: plan.workgroup_size,
            pass_count: passes.len(),
            validated,
            gpu_melem_per_sec: melem_per_sec(plan.n, gpu_stats.mean),
            gpu_stats,
            cpu_stats,
            speedup,
        }
    }
}
