use serde::{Deserialize, Serialize};

/// Default measured runs when neither the CLI nor a profile says otherwise.
pub const DEFAULT_RUNS: u32 = 10;
/// Default warmup runs.
pub const DEFAULT_WARMUP: u32 = 3;
/// Size used when no sizes or profile are given.
pub const DEFAULT_SIZE: usize = 1_000_000;

/// A benchmark profile with preset sizes, runs, and warmup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchProfile {
    pub name: String,
    pub sizes: Vec<usize>,
    pub runs: u32,
    pub warmup: u32,
}

/// Returns the "quick" profile: 64K+1M / 3 runs / 1 warmup.
pub fn quick_profile() -> BenchProfile {
    BenchProfile {
        name: "quick".to_string(),
        sizes: vec![65_536, 1_000_000],
        runs: 3,
        warmup: 1,
    }
}

/// Returns the "standard" profile: 64K+1M+4M / 10 runs / 3 warmup.
pub fn standard_profile() -> BenchProfile {
    BenchProfile {
        name: "standard".to_string(),
        sizes: vec![65_536, 1_000_000, 4_000_000],
        runs: 10,
        warmup: 3,
    }
}

/// Returns the "thorough" profile: 64K through 16M / 30 runs / 3 warmup.
pub fn thorough_profile() -> BenchProfile {
    BenchProfile {
        name: "thorough".to_string(),
        sizes: vec![65_536, 1_000_000, 4_000_000, 16_000_000],
        runs: 30,
        warmup: 3,
    }
}

/// Lookup a profile by name.
pub fn get_profile(name: &str) -> Option<BenchProfile> {
    match name {
        "quick" => Some(quick_profile()),
        "standard" => Some(standard_profile()),
        "thorough" => Some(thorough_profile()),
        _ => None,
    }
}

/// Resolve (runs, warmup): values that differ from the CLI defaults win,
/// otherwise the profile's values apply.
pub fn resolve_run_counts(runs: u32, warmup: u32, profile: Option<&BenchProfile>) -> (u32, u32) {
    match profile {
        Some(p) => (
            if runs != DEFAULT_RUNS { runs } else { p.runs },
            if warmup != DEFAULT_WARMUP { warmup } else { p.warmup },
        ),
        None => (runs, warmup),
    }
}

/// Parse a human-readable size string to a usize.
///
/// Supports:
/// - "1M" or "1m" -> 1_000_000
/// - "100K" or "100k" -> 100_000
/// - "0.5M" -> 500_000
/// - "1_000_000" -> 1_000_000
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();

    if let Some(prefix) = s.strip_suffix('M').or_else(|| s.strip_suffix('m')) {
        return scaled(s, prefix, 1_000_000.0);
    }

    if let Some(prefix) = s.strip_suffix('K').or_else(|| s.strip_suffix('k')) {
        return scaled(s, prefix, 1_000.0);
    }

    s.replace('_', "")
        .parse::<usize>()
        .map_err(|e| format!("Invalid size '{}': {}", s, e))
}

fn scaled(raw: &str, prefix: &str, multiplier: f64) -> Result<usize, String> {
    let num: f64 = prefix
        .replace('_', "")
        .parse()
        .map_err(|e| format!("Invalid size '{}': {}", raw, e))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Invalid size '{}': must be a non-negative count", raw));
    }
    Ok((num * multiplier) as usize)
}

/// Parse a comma-separated list of size strings.
pub fn parse_sizes(raw: &[String]) -> Result<Vec<usize>, String> {
    raw.iter().map(|s| parse_size(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_millions() {
        assert_eq!(parse_size("1M").unwrap(), 1_000_000);
        assert_eq!(parse_size("16M").unwrap(), 16_000_000);
        assert_eq!(parse_size("1m").unwrap(), 1_000_000);
    }

    #[test]
    fn test_parse_size_thousands() {
        assert_eq!(parse_size("100K").unwrap(), 100_000);
        assert_eq!(parse_size("100k").unwrap(), 100_000);
        assert_eq!(parse_size("1.5K").unwrap(), 1_500);
    }

    #[test]
    fn test_parse_size_raw() {
        assert_eq!(parse_size("1000000").unwrap(), 1_000_000);
        assert_eq!(parse_size("1_000_000").unwrap(), 1_000_000);
        assert_eq!(parse_size("  17 ").unwrap(), 17);
        assert_eq!(parse_size("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("abc").is_err());
        assert!(parse_size("").is_err());
        assert!(parse_size("-1M").is_err());
        assert!(parse_size("M").is_err());
    }

    #[test]
    fn test_parse_sizes_multiple() {
        let input = vec!["1M".to_string(), "64K".to_string(), "17".to_string()];
        assert_eq!(parse_sizes(&input).unwrap(), vec![1_000_000, 64_000, 17]);

        let bad = vec!["1M".to_string(), "bad".to_string()];
        assert!(parse_sizes(&bad).is_err());
    }

    #[test]
    fn test_get_profile() {
        for name in ["quick", "standard", "thorough"] {
            let p = get_profile(name).unwrap();
            assert_eq!(p.name, name);
            assert!(p.sizes.windows(2).all(|w| w[0] < w[1]));
        }
        assert!(get_profile("unknown").is_none());
    }

    #[test]
    fn test_resolve_run_counts() {
        let quick = quick_profile();
        assert_eq!(resolve_run_counts(DEFAULT_RUNS, DEFAULT_WARMUP, Some(&quick)), (3, 1));
        assert_eq!(resolve_run_counts(50, DEFAULT_WARMUP, Some(&quick)), (50, 1));
        assert_eq!(resolve_run_counts(7, 0, None), (7, 0));
    }

    #[test]
    fn test_profile_serializes() {
        let json = serde_json::to_string(&standard_profile()).unwrap();
        let back: BenchProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sizes, standard_profile().sizes);
        assert_eq!(back.runs, 10);
    }
}
