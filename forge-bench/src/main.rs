// Without Metal only argument handling runs; the measurement path is macOS-only.
#![cfg_attr(not(target_os = "macos"), allow(dead_code))]

mod cli;
mod config;
mod data_gen;
mod harness;
mod output;
mod stats;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::ForgeArgs;
use config::{get_profile, parse_sizes, resolve_run_counts, DEFAULT_SIZE};
use harness::BenchConfig;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Resolve sizes and run counts: `--sizes` beats `--profile`, which beats defaults.
fn resolve_config(args: &ForgeArgs) -> Result<BenchConfig, String> {
    let profile = match &args.profile {
        Some(name) => Some(get_profile(name).ok_or_else(|| {
            format!("Unknown profile '{}'. Valid: quick, standard, thorough", name)
        })?),
        None => None,
    };

    let sizes = match (&args.sizes, &profile) {
        (Some(raw), _) => parse_sizes(raw)?,
        (None, Some(p)) => p.sizes.clone(),
        (None, None) => vec![DEFAULT_SIZE],
    };
    let (runs, warmup) = resolve_run_counts(args.runs, args.warmup, profile.as_ref());

    Ok(BenchConfig {
        sizes,
        runs,
        warmup,
        order: args.order,
        mode: args.mode,
        max_workgroup_size: args.max_workgroup_size,
    })
}

fn main() {
    let args = ForgeArgs::parse();
    init_tracing(args.verbose);

    let config = match resolve_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args, &config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_os = "macos")]
fn run(args: &ForgeArgs, config: &BenchConfig) -> Result<(), String> {
    use forge_bitonic::SortContext;
    use objc2_metal::MTLDevice;

    use output::json::DeviceHeader;
    use output::progress::BenchProgress;

    let ctx = SortContext::new().map_err(|e| e.to_string())?;
    let limits = ctx.limits();
    let device = DeviceHeader {
        name: ctx.device().name().to_string(),
        max_threads_per_threadgroup: limits.max_threads_per_threadgroup,
        max_threadgroup_memory: limits.max_threadgroup_memory,
    };

    println!("forge-bench: bitonic sort benchmark");
    println!(
        "  Device: {} (threadgroup: {} threads, {} bytes)",
        device.name, device.max_threads_per_threadgroup, device.max_threadgroup_memory
    );
    println!("  Mode: {}, Order: {}", config.mode.name(), config.order);
    println!("  Sizes: {:?}", config.sizes);
    println!("  Runs: {}, Warmup: {}", config.runs, config.warmup);
    if let Some(path) = &args.json_file {
        println!("  JSON output: {}", path);
    }
    println!();

    let progress = BenchProgress::new();
    let cb = progress.callback();
    let results = harness::run_sizes(&ctx, config, Some(&cb));
    progress.finish();
    let results = results.map_err(|e| e.to_string())?;

    output::table::render_table(&results);

    if let Some(path) = &args.json_file {
        output::json::write_json(path, &device, config.runs, config.warmup, &results)?;
    }

    if results.iter().any(|dp| !dp.validated) {
        return Err("GPU results did not match the host sort".to_string());
    }
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run(_args: &ForgeArgs, _config: &BenchConfig) -> Result<(), String> {
    Err("forge-bench requires a Metal device (macOS)".to_string())
}
