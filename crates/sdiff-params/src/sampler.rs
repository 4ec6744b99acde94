//! Uniform sampling of range-valued parameters
//!
//! One [`Sample`] is drawn per attempt and applied to every solver variant,
//! so both builds always see the same point of parameter space.

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{range_bounds, Configuration};
use crate::error::SampleError;

/// Closed numeric interval declared as `min,max`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
}

impl ParamRange {
    /// Parse the raw value of parameter `key`
    ///
    /// Reversed bounds are accepted and normalised.
    ///
    /// # Errors
    /// - `SampleError::RangeParse` if the value is not two comma-separated floats
    /// - `SampleError::NonFinite` if either bound is infinite or NaN
    pub fn parse(key: &str, value: &str) -> Result<Self, SampleError> {
        let (a, b) = range_bounds(value).ok_or_else(|| SampleError::RangeParse {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        if !a.is_finite() || !b.is_finite() {
            return Err(SampleError::NonFinite {
                key: key.to_string(),
                min: a,
                max: b,
            });
        }
        Ok(Self {
            min: a.min(b),
            max: a.max(b),
        })
    }

    /// Check if a value lies inside the interval
    #[inline]
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Concrete values for every varying parameter, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    values: IndexMap<String, f64>,
}

impl Sample {
    /// Get a drawn value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Iterate drawn values in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of drawn values
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve the given varying keys on top of fixed parameters
    ///
    /// Keys of `varying` that were not drawn are left out.
    #[must_use]
    pub fn resolve(&self, fixed: &Configuration, varying: &Configuration) -> Configuration {
        let mut resolved = fixed.clone();
        for key in varying.keys() {
            if let Some(value) = self.get(key) {
                resolved.insert(key, value.to_string());
            }
        }
        resolved
    }
}

impl FromIterator<(String, f64)> for Sample {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Draws samples from varying parameters
#[derive(Debug, Clone)]
pub struct Sampler<R = StdRng> {
    rng: R,
}

impl Sampler<StdRng> {
    /// Sampler seeded from the operating system
    #[inline]
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible sampler
    #[inline]
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Sampler<R> {
    /// Wrap an existing generator
    #[inline]
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draw one value uniformly in `[min, max]`
    ///
    /// Ranges wider than `f64::MAX` are interpolated between the bounds, since
    /// their width overflows.
    pub fn draw(&mut self, range: ParamRange) -> f64 {
        let ParamRange { min, max } = range;
        if (max - min).is_finite() {
            return self.rng.gen_range(min..=max);
        }
        let t: f64 = self.rng.gen();
        (min * (1.0 - t) + max * t).clamp(min, max)
    }

    /// Draw one value for every varying parameter
    ///
    /// # Errors
    /// Propagates the first `SampleError` instead of skipping the parameter
    pub fn sample(&mut self, varying: &Configuration) -> Result<Sample, SampleError> {
        let mut values = IndexMap::with_capacity(varying.len());
        for (key, raw) in varying.iter() {
            let range = ParamRange::parse(key, raw)?;
            values.insert(key.to_string(), self.draw(range));
        }
        Ok(Sample { values })
    }
}
