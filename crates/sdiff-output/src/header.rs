//! Indexed column headers
//!
//! Both the solver output files and the result table annotate their columns
//! on a `#` line as `1:first label  2:second label ...`. Labels may contain
//! single spaces and colons, so columns are delimited by the `N:` markers
//! rather than by whitespace.

use once_cell::sync::Lazy;
use regex::Regex;

/// `N:` column marker at the start of the line or after whitespace
static COLUMN_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)\d+:").expect("column marker pattern is valid"));

/// Separator of unnumbered headers
static WIDE_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("gap pattern is valid"));

/// Split a header line into column labels, dropping the `N:` prefixes
///
/// Leading `#` characters are ignored. Whitespace inside one label collapses
/// to single spaces. A header without any `N:` marker falls back to
/// splitting on runs of two or more spaces.
#[must_use]
pub fn parse_header(line: &str) -> Vec<String> {
    let body = line.trim_start().trim_start_matches('#');
    let markers: Vec<_> = COLUMN_MARKER.find_iter(body).collect();

    if markers.is_empty() {
        return WIDE_GAP
            .split(body.trim())
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();
    }

    // Text before the first marker is not a column
    markers
        .iter()
        .enumerate()
        .map(|(i, marker)| {
            let end = markers.get(i + 1).map_or(body.len(), |next| next.start());
            body[marker.end()..end]
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Base variable name of a label: the part after the last `:`
#[inline]
#[must_use]
pub fn base_name(label: &str) -> &str {
    label.rsplit(':').next().unwrap_or(label).trim()
}

/// Render a header line with 1-based `N:` prefixes, padded to `width`
#[must_use]
pub fn format_header<S: AsRef<str>>(labels: &[S], width: usize) -> String {
    let mut line = String::from("#");
    for (i, label) in labels.iter().enumerate() {
        let token = format!("{}:{}", i + 1, label.as_ref());
        line.push(' ');
        line.push_str(&format!("{token:<width$}"));
    }
    line.trim_end().to_string()
}
