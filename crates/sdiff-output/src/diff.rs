//! Interpolated relative differences
//!
//! For every dependent variable shared by two solver runs, both series are
//! interpolated linearly onto the abscissae of the first run that fall in
//! the overlap domain, and the worst relative deviation (in percent) is
//! reported. When a reference pair is supplied, its own deviation is
//! subtracted point by point before taking the maximum.
//!
//! NaN deviations are sticky: once one point yields NaN the result is NaN.

use indexmap::IndexMap;

use crate::catalog::Catalog;
use crate::error::DiffError;
use crate::reader::OutputTable;

/// Piecewise-linear interpolant over a sorted copy of the input points
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInterpolant {
    points: Vec<(f64, f64)>,
}

impl LinearInterpolant {
    /// Build from parallel abscissa/ordinate slices (any order)
    ///
    /// # Errors
    /// - `DiffError::LengthMismatch` if the slices differ in length
    /// - `DiffError::EmptySeries` if they are empty
    /// - `DiffError::NanAbscissa` if an abscissa is NaN
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, DiffError> {
        if x.len() != y.len() {
            return Err(DiffError::LengthMismatch {
                x_len: x.len(),
                y_len: y.len(),
            });
        }
        if x.is_empty() {
            return Err(DiffError::EmptySeries);
        }
        if x.iter().any(|v| v.is_nan()) {
            return Err(DiffError::NanAbscissa);
        }
        let mut points: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self { points })
    }

    /// Smallest and largest abscissa
    #[inline]
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        // Non-empty by construction
        (self.points[0].0, self.points[self.points.len() - 1].0)
    }

    /// Evaluate at `x`
    ///
    /// # Errors
    /// Returns `DiffError::OutOfDomain` if `x` lies outside [`Self::domain`]
    pub fn eval(&self, x: f64) -> Result<f64, DiffError> {
        let (min, max) = self.domain();
        let idx = self.points.partition_point(|p| p.0 < x);
        if idx < self.points.len() && self.points[idx].0 == x {
            return Ok(self.points[idx].1);
        }
        if idx == 0 || idx == self.points.len() {
            return Err(DiffError::OutOfDomain { x, min, max });
        }
        let (x0, y0) = self.points[idx - 1];
        let (x1, y1) = self.points[idx];
        Ok(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
    }
}

/// Borrowed abscissa/ordinate pair
#[derive(Debug, Clone, Copy)]
pub struct Series<'a> {
    /// Abscissae
    pub x: &'a [f64],
    /// Ordinates
    pub y: &'a [f64],
}

impl<'a> Series<'a> {
    /// Pair up two slices
    #[inline]
    #[must_use]
    pub fn new(x: &'a [f64], y: &'a [f64]) -> Self {
        Self { x, y }
    }
}

/// The same variable from the two solver versions
#[derive(Debug, Clone, Copy)]
pub struct SeriesPair<'a> {
    /// First version
    pub v1: Series<'a>,
    /// Second version
    pub v2: Series<'a>,
}

impl<'a> SeriesPair<'a> {
    /// Pair up two series
    #[inline]
    #[must_use]
    pub fn new(v1: Series<'a>, v2: Series<'a>) -> Self {
        Self { v1, v2 }
    }
}

struct PairInterpolant {
    v1: LinearInterpolant,
    v2: LinearInterpolant,
}

impl PairInterpolant {
    fn new(pair: SeriesPair<'_>) -> Result<Self, DiffError> {
        Ok(Self {
            v1: LinearInterpolant::new(pair.v1.x, pair.v1.y)?,
            v2: LinearInterpolant::new(pair.v2.x, pair.v2.y)?,
        })
    }

    fn domains(&self) -> [(f64, f64); 2] {
        [self.v1.domain(), self.v2.domain()]
    }

    /// Signed relative deviation `v2/v1 - 1`, zero where both vanish
    fn deviation(&self, x: f64) -> Result<f64, DiffError> {
        let y1 = self.v1.eval(x)?;
        let y2 = self.v2.eval(x)?;
        if y1 == 0.0 && y2 == 0.0 {
            Ok(0.0)
        } else {
            Ok(y2 / y1 - 1.0)
        }
    }
}

/// Worst-case relative difference between two versions, in percent
///
/// Sample points are the abscissae of `pair.v1` inside the overlap of every
/// supplied series. With a reference pair the reported value at each point
/// is `100 * |diff - ref_diff|`, otherwise `100 * |diff|`.
///
/// # Errors
/// - `DiffError::EmptyOverlap` if the series share no sample point
/// - interpolant construction errors for malformed series
pub fn max_relative_diff(
    pair: SeriesPair<'_>,
    reference: Option<SeriesPair<'_>>,
) -> Result<f64, DiffError> {
    let primary = PairInterpolant::new(pair)?;
    let reference = reference.map(PairInterpolant::new).transpose()?;

    let mut min = f64::NEG_INFINITY;
    let mut max = f64::INFINITY;
    let domains = primary
        .domains()
        .into_iter()
        .chain(reference.iter().flat_map(PairInterpolant::domains));
    for (lo, hi) in domains {
        min = min.max(lo);
        max = max.min(hi);
    }
    if min > max {
        return Err(DiffError::EmptyOverlap { min, max });
    }

    let mut sampled = 0usize;
    let mut worst = 0.0f64;
    for &x in pair.v1.x.iter().filter(|&&x| min <= x && x <= max) {
        let diff = primary.deviation(x)?;
        let value = match &reference {
            Some(reference) => {
                let ref_diff = reference.deviation(x)?;
                if diff == ref_diff {
                    0.0
                } else {
                    (diff - ref_diff).abs()
                }
            }
            None => diff.abs(),
        };
        // A NaN worst never compares smaller, so it stays
        if value.is_nan() || value > worst {
            worst = value;
        }
        sampled += 1;
    }
    if sampled == 0 {
        return Err(DiffError::EmptyOverlap { min, max });
    }
    Ok(100.0 * worst)
}

/// Table column of one compared variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey {
    /// Output category
    pub category: String,
    /// Dependent variable
    pub variable: String,
}

impl ColumnKey {
    /// Create column key
    #[inline]
    #[must_use]
    pub fn new(category: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            variable: variable.into(),
        }
    }
}

impl std::fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.category, self.variable)
    }
}

/// Per-variable worst differences of one step, in catalog order
pub type DiffSet = IndexMap<ColumnKey, f64>;

/// Reference-model tables subtracted from the primary comparison
#[derive(Debug, Clone, Copy)]
pub struct ReferenceTables<'a> {
    /// Reference run of the first version
    pub v1: &'a OutputTable,
    /// Reference run of the second version
    pub v2: &'a OutputTable,
}

/// Compares two output tables variable by variable
#[derive(Debug, Clone)]
pub struct DiffEngine {
    catalog: Catalog,
}

impl DiffEngine {
    /// Create engine for a catalog
    #[inline]
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Worst relative difference of every variable present in all tables
    ///
    /// Variables missing from any involved table are left out of the result.
    ///
    /// # Errors
    /// Returns the first `DiffError`, tagged with its column
    pub fn compare(
        &self,
        v1: &OutputTable,
        v2: &OutputTable,
        reference: Option<ReferenceTables<'_>>,
    ) -> Result<DiffSet, DiffError> {
        let mut diffs = DiffSet::new();
        for (category, spec) in self.catalog.iter() {
            for variable in &spec.y {
                let key = ColumnKey::new(category, variable.as_str());
                let Some(pair) = series_pair(v1, v2, category, variable) else {
                    tracing::debug!("Skipping {}: not produced by both versions", key);
                    continue;
                };
                let reference_pair = match reference {
                    Some(tables) => {
                        match series_pair(tables.v1, tables.v2, category, variable) {
                            Some(reference_pair) => Some(reference_pair),
                            None => {
                                tracing::debug!("Skipping {}: missing from reference runs", key);
                                continue;
                            }
                        }
                    }
                    None => None,
                };
                let value = max_relative_diff(pair, reference_pair)
                    .map_err(|e| e.in_column(key.to_string()))?;
                tracing::trace!("{} max diff {}%", key, value);
                diffs.insert(key, value);
            }
        }
        Ok(diffs)
    }
}

fn series_pair<'a>(
    v1: &'a OutputTable,
    v2: &'a OutputTable,
    category: &str,
    variable: &str,
) -> Option<SeriesPair<'a>> {
    let c1 = v1.category(category)?;
    let c2 = v2.category(category)?;
    Some(SeriesPair::new(
        Series::new(&c1.x, c1.column(variable)?),
        Series::new(&c2.x, c2.column(variable)?),
    ))
}
