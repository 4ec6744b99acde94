//! Scatter plots of the result table
//!
//! For each difference column, one plot against the step index and one
//! against every input column. Difference columns are recognised by the
//! `category:variable` form of their name.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use sdiff_output::TableColumns;

use crate::error::{RunError, RunResult};

const SIZE: (u32, u32) = (800, 600);

/// Render every plot of `columns` into `dir`
///
/// # Errors
/// Returns `RunError::Io` if `dir` cannot be created, or `RunError::Plot`
/// if a chart cannot be drawn
pub fn render_all(columns: &TableColumns, dir: &Path) -> RunResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| RunError::io_error(dir, e))?;

    let (diffs, inputs): (Vec<_>, Vec<_>) = columns.iter().partition(|(name, _)| name.contains(':'));

    let mut written = Vec::new();
    for (diff_name, diff) in &diffs {
        let stem = file_stem(diff_name);
        let steps: Vec<f64> = (1..=diff.len()).map(|i| i as f64).collect();

        let path = dir.join(format!("{stem}_vs_step.svg"));
        scatter(&path, "step", &steps, diff_name, diff)?;
        written.push(path);

        for (input_name, input) in &inputs {
            let path = dir.join(format!("{stem}_vs_{}.svg", file_stem(input_name)));
            scatter(&path, input_name, input, diff_name, diff)?;
            written.push(path);
        }
    }

    tracing::info!("Rendered {} plots into {}", written.len(), dir.display());
    Ok(written)
}

fn scatter(path: &Path, x_label: &str, x: &[f64], y_label: &str, y: &[f64]) -> RunResult<()> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect();
    let x_range = padded(points.iter().map(|p| p.0));
    let y_range = padded(points.iter().map(|p| p.1));

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_error(path, &e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{y_label} vs {x_label}"), ("sans-serif", 20))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| plot_error(path, &e))?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(format!("max diff {y_label} [%]"))
        .draw()
        .map_err(|e| plot_error(path, &e))?;

    chart
        .draw_series(points.iter().map(|&p| Circle::new(p, 3, BLUE.filled())))
        .map_err(|e| plot_error(path, &e))?;

    root.present().map_err(|e| plot_error(path, &e))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

fn plot_error(path: &Path, e: &impl std::fmt::Display) -> RunError {
    RunError::Plot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

// Axis range over finite values, never degenerate
fn padded(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        return 0.0..1.0;
    }
    let pad = if max > min { 0.05 * (max - min) } else { 0.5 * min.abs().max(1.0) };
    (min - pad)..(max + pad)
}

fn file_stem(column: &str) -> String {
    column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}
