//! Table output using comfy-table.
//!
//! Columns: Size | Padded | WG | Passes | GPU (ms) | CPU (ms) | Speedup | Melem/s | CV% | OK

use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::harness::{format_size, DataPoint};

fn header(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn right(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

fn speedup_cell(speedup: f64) -> Cell {
    let color = if speedup >= 5.0 {
        Color::Green
    } else if speedup >= 2.0 {
        Color::Cyan
    } else if speedup >= 1.0 {
        Color::Yellow
    } else {
        Color::Red
    };
    right(format!("{:.1}x", speedup)).fg(color)
}

/// Build the results table for `data`.
pub fn build_table(data: &[DataPoint]) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header("Size"),
            header("Padded"),
            header("WG"),
            header("Passes"),
            header("GPU (ms)"),
            header("CPU (ms)"),
            header("Speedup"),
            header("Melem/s"),
            header("CV%"),
            header("OK"),
        ]);

    for dp in data {
        let ok = if dp.validated {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("NO").fg(Color::Red)
        };
        table.add_row(vec![
            right(format_size(dp.size)),
            right(dp.padded_size.to_string()),
            right(dp.workgroup_size.to_string()),
            right(dp.pass_count.to_string()),
            right(format!("{:.3}", dp.gpu_stats.mean)),
            right(format!("{:.3}", dp.cpu_stats.mean)),
            speedup_cell(dp.speedup),
            right(format!("{:.1}", dp.gpu_melem_per_sec)),
            right(format!("{:.1}", dp.gpu_stats.cv_percent)),
            ok,
        ]);
    }

    table
}

/// Print the results table, titled by mode and order.
pub fn render_table(data: &[DataPoint]) {
    let Some(first) = data.first() else {
        println!("No results to display.");
        return;
    };
    println!("\n=== bitonic {} ({}) ===", first.mode, first.order);
    println!("{}", build_table(data));
}
