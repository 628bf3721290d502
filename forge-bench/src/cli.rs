use clap::{Parser, ValueEnum};
use forge_bitonic::SortOrder;

/// Which sort session the benchmark drives.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchMode {
    /// Permute the data buffer itself.
    InPlace,
    /// Produce a sorting permutation, leaving the data untouched.
    Index,
}

impl BenchMode {
    pub fn name(&self) -> &'static str {
        match self {
            BenchMode::InPlace => "in-place",
            BenchMode::Index => "index",
        }
    }
}

/// Bitonic sort benchmark harness for Apple Silicon
#[derive(Parser, Debug)]
#[command(name = "forge-bench", version, about)]
pub struct ForgeArgs {
    /// Element counts to benchmark (e.g., 1M, 100K, 1_000_000)
    #[arg(long, value_delimiter = ',')]
    pub sizes: Option<Vec<String>>,

    /// Number of measured runs per size
    #[arg(long, default_value_t = 10)]
    pub runs: u32,

    /// Number of warmup runs before measurement
    #[arg(long, default_value_t = 3)]
    pub warmup: u32,

    /// Benchmark profile: quick (64K+1M/3/1), standard (64K+1M+4M/10/3), thorough (64K..16M/30/3)
    #[arg(long)]
    pub profile: Option<String>,

    /// Sort direction: asc or desc
    #[arg(long, default_value_t = SortOrder::Ascending)]
    pub order: SortOrder,

    /// Session kind to benchmark
    #[arg(long, value_enum, default_value_t = BenchMode::InPlace)]
    pub mode: BenchMode,

    /// Cap on the planned workgroup size
    #[arg(long)]
    pub max_workgroup_size: Option<usize>,

    /// Write JSON results to file
    #[arg(long)]
    pub json_file: Option<String>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}
