//! JSON report: device limits, run configuration, and one entry per size.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::harness::DataPoint;

/// Device limits recorded in the report header.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceHeader {
    pub name: String,
    pub max_threads_per_threadgroup: usize,
    pub max_threadgroup_memory: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    device: &'a DeviceHeader,
    timestamp: String,
    runs: u32,
    warmup: u32,
    results: &'a [DataPoint],
}

fn render(device: &DeviceHeader, runs: u32, warmup: u32, data: &[DataPoint]) -> Result<String, String> {
    let report = JsonReport {
        device,
        timestamp: chrono::Utc::now().to_rfc3339(),
        runs,
        warmup,
        results: data,
    };
    serde_json::to_string_pretty(&report).map_err(|e| format!("JSON serialization failed: {}", e))
}

/// Write benchmark results to `path`, creating parent directories.
pub fn write_json(
    path: &str,
    device: &DeviceHeader,
    runs: u32,
    warmup: u32,
    data: &[DataPoint],
) -> Result<(), String> {
    let json = render(device, runs, warmup, data)?;

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;
        }
    }

    fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path, e))?;
    tracing::info!(path, "JSON results written");
    Ok(())
}
