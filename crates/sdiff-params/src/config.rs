//! Ini-style parameter files
//!
//! Line oriented `key = value` pairs. Everything after a `#` is a comment,
//! lines without `=` are ignored. A value is a *range* when it splits on `,`
//! into exactly two parts that both parse as floating point numbers; every
//! other value is an opaque scalar.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::ConfigError;

/// Flat parameter mapping, kept in declaration order
///
/// Duplicate keys are last-wins. Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    entries: IndexMap<String, String>,
}

impl Configuration {
    /// Create empty configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration text
    ///
    /// Never fails: malformed lines are skipped.
    #[must_use]
    pub fn parse_str(text: &str) -> Self {
        let mut config = Self::new();
        for line in text.lines() {
            let line = line.split_once('#').map_or(line, |(before, _)| before);
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            config.insert(key, value.trim());
        }
        config
    }

    /// Render as `key = value` lines
    #[must_use]
    pub fn to_ini_string(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            // Writing into a String cannot fail
            let _ = writeln!(out, "{key} = {value}");
        }
        out
    }

    /// Get a value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert or replace a value, keeping the original position of the key
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Remove a value, preserving the order of the remaining keys
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    /// Check key presence
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Return a copy with `other` laid over `self` (other wins)
    #[must_use]
    pub fn overlay(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for (key, value) in other.iter() {
            merged.insert(key, value);
        }
        merged
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = Self::new();
        for (key, value) in iter {
            config.insert(key, value);
        }
        config
    }
}

/// Configuration split into fixed and range-valued entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    /// Scalar entries, forwarded verbatim
    pub fixed: Configuration,
    /// Range entries, raw `min,max` text
    pub varying: Configuration,
}

/// Read a parameter file
///
/// # Errors
/// - `ConfigError::Missing` if the file does not exist
/// - `ConfigError::Io` if it cannot be read
pub fn parse(path: impl AsRef<Path>) -> Result<Configuration, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::Missing {
            path: path.to_path_buf(),
        });
    }
    let text = fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
    let config = Configuration::parse_str(&text);
    tracing::debug!("Read {} parameters from {}", config.len(), path.display());
    Ok(config)
}

/// Write a configuration, replacing any existing file
///
/// # Errors
/// Returns `ConfigError::Io` if the file cannot be written
pub fn serialize(config: &Configuration, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    fs::write(path, config.to_ini_string()).map_err(|e| ConfigError::io_error(path, e))
}

/// Split a configuration into fixed and varying entries
///
/// Every key lands in exactly one of the two halves.
#[must_use]
pub fn classify(config: &Configuration) -> Classified {
    let mut classified = Classified::default();
    for (key, value) in config.iter() {
        if is_range(value) {
            classified.varying.insert(key, value);
        } else {
            classified.fixed.insert(key, value);
        }
    }
    classified
}

/// Check whether a raw value encodes a numeric range
#[inline]
#[must_use]
pub fn is_range(value: &str) -> bool {
    range_bounds(value).is_some()
}

/// Parse the two endpoints of a range value
#[must_use]
pub fn range_bounds(value: &str) -> Option<(f64, f64)> {
    let mut parts = value.split(',');
    let first = parts.next()?.trim().parse::<f64>().ok()?;
    let second = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((first, second))
}

/// Union of the varying entries of several configurations
///
/// A key may appear in more than one input as long as its bounds agree.
///
/// # Errors
/// Returns `ConfigError::ConflictingRange` if one key carries two different ranges
pub fn union_varying<'a>(
    sets: impl IntoIterator<Item = &'a Configuration>,
) -> Result<Configuration, ConfigError> {
    let mut union = Configuration::new();
    for set in sets {
        for (key, value) in set.iter() {
            match union.get(key) {
                None => union.insert(key, value),
                Some(existing) if range_bounds(existing) == range_bounds(value) => {}
                Some(existing) => {
                    return Err(ConfigError::ConflictingRange {
                        key: key.to_string(),
                        first: existing.to_string(),
                        second: value.to_string(),
                    });
                }
            }
        }
    }
    Ok(union)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_strips_comments_and_whitespace() {
        let config = Configuration::parse_str(
            "h = 0.6,0.7   # hubble\n# full comment = ignored\noutput = tCl,pCl\nno equals here\n",
        );
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("h"), Some("0.6,0.7"));
        assert_eq!(config.get("output"), Some("tCl,pCl"));
    }

    #[test]
    fn parse_is_last_wins_on_duplicates() {
        let config = Configuration::parse_str("a = 1\nb = 2\na = 3\n");
        assert_eq!(config.get("a"), Some("3"));
        assert_eq!(config.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn parse_splits_on_first_equals() {
        let config = Configuration::parse_str("expr = a=b\n");
        assert_eq!(config.get("expr"), Some("a=b"));
    }

    #[test]
    fn classify_scenario() {
        let config: Configuration = [("h", "0.6,0.7"), ("n_s", "0.96")].into_iter().collect();
        let classified = classify(&config);

        assert_eq!(classified.varying.keys().collect::<Vec<_>>(), vec!["h"]);
        assert_eq!(classified.fixed.get("n_s"), Some("0.96"));
        assert!(!classified.fixed.contains_key("h"));
    }

    #[test]
    fn string_with_comma_stays_fixed() {
        assert!(!is_range("tCl,pCl"));
        assert!(!is_range("1,2,3"));
        assert!(!is_range("0.5"));
        assert!(is_range(" 1e-3 , 2 "));
    }

    #[test]
    fn overlay_prefers_other() {
        let base: Configuration = [("a", "1"), ("b", "2")].into_iter().collect();
        let top: Configuration = [("b", "20"), ("c", "30")].into_iter().collect();
        let merged = base.overlay(&top);

        assert_eq!(merged.get("a"), Some("1"));
        assert_eq!(merged.get("b"), Some("20"));
        assert_eq!(merged.get("c"), Some("30"));
    }

    #[test]
    fn union_varying_accepts_equal_ranges() {
        let a: Configuration = [("h", "0.6,0.7")].into_iter().collect();
        let b: Configuration = [("h", "0.6, 0.7"), ("w", "-1,0")].into_iter().collect();
        let union = union_varying([&a, &b]).unwrap();

        assert_eq!(union.keys().collect::<Vec<_>>(), vec!["h", "w"]);
    }

    #[test]
    fn union_varying_rejects_conflict() {
        let a: Configuration = [("h", "0.6,0.7")].into_iter().collect();
        let b: Configuration = [("h", "0.5,0.7")].into_iter().collect();

        assert!(matches!(
            union_varying([&a, &b]),
            Err(ConfigError::ConflictingRange { .. })
        ));
    }

    #[test]
    fn parse_missing_file() {
        let result = parse("/definitely/not/here.ini");
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }
}
