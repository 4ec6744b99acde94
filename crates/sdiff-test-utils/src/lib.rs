//! Testing utilities for sdiff workspace
//!
//! Shared fixtures: solver-format output files and parameter files.

#![allow(missing_docs)]

use sdiff_params::Configuration;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Render a solver-style table: free-text comment, indexed header, rows
pub fn solver_table(labels: &[&str], columns: &[&[f64]]) -> String {
    let mut text = String::from("# Table written by a fake solver\n#");
    for (i, label) in labels.iter().enumerate() {
        let _ = write!(text, "  {:>4}:{:<18}", i + 1, label);
    }
    text.push('\n');
    let rows = columns.first().map_or(0, |c| c.len());
    for r in 0..rows {
        for column in columns {
            let _ = write!(text, "  {:>22.15e}", column[r]);
        }
        text.push('\n');
    }
    text
}

pub fn write_file(path: &Path, text: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
    path.to_path_buf()
}

/// `<dir>/<stem>_background.dat` with z and `H [1/Mpc]`
pub fn write_background(dir: &Path, stem: &str, z: &[f64], h: &[f64]) -> PathBuf {
    let proper_time: Vec<f64> = z.iter().map(|z| 13.8 / (1.0 + z)).collect();
    write_file(
        &dir.join(format!("{stem}_background.dat")),
        &solver_table(&["z", "proper time [Gyr]", "H [1/Mpc]"], &[z, &proper_time, h]),
    )
}

/// `<dir>/<stem>_cl.dat` with l, TT and EE
pub fn write_cl(dir: &Path, stem: &str, l: &[f64], tt: &[f64], ee: &[f64]) -> PathBuf {
    write_file(
        &dir.join(format!("{stem}_cl.dat")),
        &solver_table(&["l", "TT", "EE"], &[l, tt, ee]),
    )
}

/// `<dir>/<stem>_pk.dat` with `k (h/Mpc)` and `P (Mpc/h)^3`
pub fn write_pk(dir: &Path, stem: &str, k: &[f64], p: &[f64]) -> PathBuf {
    write_file(
        &dir.join(format!("{stem}_pk.dat")),
        &solver_table(&["k (h/Mpc)", "P (Mpc/h)^3"], &[k, p]),
    )
}

/// Background and cl outputs scaled by `factor` relative to a fixed baseline
pub fn write_scaled_outputs(dir: &Path, stem: &str, factor: f64) {
    let z = [10.0, 5.0, 1.0, 0.5, 0.0];
    let h: Vec<f64> = [3.0e-3, 1.5e-3, 5.0e-4, 3.5e-4, 2.2e-4]
        .iter()
        .map(|v| v * factor)
        .collect();
    write_background(dir, stem, &z, &h);

    let l = [2.0, 3.0, 4.0, 5.0];
    let tt: Vec<f64> = [1.0e-10, 9.0e-11, 8.0e-11, 7.5e-11]
        .iter()
        .map(|v| v * factor)
        .collect();
    let ee: Vec<f64> = [1.0e-12, 2.0e-12, 3.0e-12, 4.0e-12]
        .iter()
        .map(|v| v * factor)
        .collect();
    write_cl(dir, stem, &l, &tt, &ee);
}

pub fn config_of(pairs: &[(&str, &str)]) -> Configuration {
    pairs.iter().copied().collect()
}

/// Parameter file with every line of `body`, plus the keys a run requires
pub fn write_run_ini(path: &Path, output_root: &Path, v1: &Path, v2: &Path, body: &str) -> PathBuf {
    let text = format!(
        "root_output = {}\nroot_class_v1 = {}\nroot_class_v2 = {}\n{body}",
        output_root.display(),
        v1.display(),
        v2.display()
    );
    write_file(path, &text)
}
