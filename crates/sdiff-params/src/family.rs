//! Indexed key families
//!
//! The solver encodes array-valued settings as suffixed keys
//! (`parameters_smg__1`, `parameters_smg__2`, ...). Grouping collapses each
//! family into a single key holding the comma-joined values in index order.

use std::collections::BTreeSet;

use crate::config::Configuration;
use crate::error::ConfigError;

/// Separator between a family base name and its index
pub const FAMILY_SEPARATOR: &str = "__";

/// Split `base__N` into `(base, N)`
///
/// Indices are 1-based decimal integers without leading zeros.
#[must_use]
pub fn split_indexed(key: &str) -> Option<(&str, usize)> {
    let (base, suffix) = key.rsplit_once(FAMILY_SEPARATOR)?;
    if base.is_empty()
        || suffix.is_empty()
        || suffix.starts_with('0')
        || !suffix.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    suffix.parse().ok().map(|index| (base, index))
}

/// Collapse every indexed family into its base key
///
/// A family exists when `base__1` is present; its members are the keys whose
/// exact prefix is `base__` followed by an index. The collapsed key takes the
/// position of `base__1`. Grouping repeats until no family remains, so the
/// result is a fixed point.
///
/// # Errors
/// - `ConfigError::IncompleteFamily` if indices `1..=count` are not all present
/// - `ConfigError::FamilyConflict` if `base` is also a plain key
pub fn group_families(config: &Configuration) -> Result<Configuration, ConfigError> {
    let mut current = config.clone();
    loop {
        let (next, grouped) = group_once(&current)?;
        if grouped == 0 {
            return Ok(next);
        }
        current = next;
    }
}

fn group_once(config: &Configuration) -> Result<(Configuration, usize), ConfigError> {
    let bases: BTreeSet<&str> = config
        .keys()
        .filter_map(split_indexed)
        .filter(|&(_, index)| index == 1)
        .map(|(base, _)| base)
        .collect();

    if bases.is_empty() {
        return Ok((config.clone(), 0));
    }

    for base in &bases {
        if config.contains_key(base) {
            return Err(ConfigError::FamilyConflict {
                base: (*base).to_string(),
            });
        }
        let indices: BTreeSet<usize> = config
            .keys()
            .filter_map(split_indexed)
            .filter(|(b, _)| b == base)
            .map(|(_, index)| index)
            .collect();
        if let Some(missing) = (1..=indices.len()).find(|i| !indices.contains(i)) {
            return Err(ConfigError::IncompleteFamily {
                base: (*base).to_string(),
                missing,
            });
        }
    }

    let mut grouped = Configuration::new();
    for (key, value) in config.iter() {
        match split_indexed(key) {
            Some((base, 1)) if bases.contains(base) => {
                grouped.insert(base, join_family(config, base));
            }
            Some((base, _)) if bases.contains(base) => {}
            _ => grouped.insert(key, value),
        }
    }
    tracing::trace!("Grouped {} indexed families", bases.len());
    Ok((grouped, bases.len()))
}

fn join_family(config: &Configuration, base: &str) -> String {
    let mut index = 1;
    let mut values = Vec::new();
    while let Some(value) = config.get(&format!("{base}{FAMILY_SEPARATOR}{index}")) {
        values.push(value);
        index += 1;
    }
    values.join(",")
}
