//! Distributions for processing, creation, repair and failure-trigger draws
//!
//! A [`Distribution`] is a validated, serializable description of a random
//! variable. Stations never sample a `Distribution` directly; they hold a
//! [`Sampler`], the injectable "draw a number" capability. The stock sampler
//! is [`DistSampler`], which pairs a distribution with its own seeded RNG so
//! that every stream is reproducible independently of the others.

use crate::error::DistributionError;
use crate::SimTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capability to draw numbers, one at a time.
///
/// Implement this to feed stations with scripted or recorded draws.
pub trait Sampler: Send {
    /// Draw the next value, in time units (or item counts for count triggers).
    fn sample(&mut self) -> f64;

    /// Draw the next value as a duration. Negative draws become zero.
    fn sample_duration(&mut self) -> Duration {
        SimTime::from_units_saturating(self.sample()).as_duration()
    }

    /// Draw the next value as a positive count (at least one).
    fn sample_count(&mut self) -> u64 {
        let value = self.sample();
        if value.is_finite() && value >= 1.0 {
            value.round() as u64
        } else {
            1
        }
    }
}

fn zero() -> f64 {
    0.0
}

fn one() -> f64 {
    1.0
}

/// Closed set of supported distributions.
///
/// Construct through the validating constructors (`Distribution::uniform`,
/// ...) or deserialize and call [`Distribution::validate`]. Bare numbers
/// convert into `Constant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    /// Always the same value.
    Constant { value: f64 },
    /// Continuous uniform on `[min, max]`.
    Uniform { min: f64, max: f64 },
    /// Triangular with lower limit `min`, upper limit `max` and peak `mode`.
    Triangular { min: f64, mode: f64, max: f64 },
    /// Normal with mean `mean` and standard deviation `std`.
    Normal { mean: f64, std: f64 },
    /// Exponential shifted by `min`, with overall mean `mean`.
    Exponential {
        mean: f64,
        #[serde(default = "zero")]
        min: f64,
    },
    /// Beta(`alpha`, `beta`) rescaled from `[0, 1]` onto `[min, max]`.
    Beta {
        alpha: f64,
        beta: f64,
        #[serde(default = "zero")]
        min: f64,
        #[serde(default = "one")]
        max: f64,
    },
    /// Gamma with shape `k` and scale `theta`.
    Gamma { shape: f64, scale: f64 },
    /// Weibull with shape `k` and scale `lambda`.
    Weibull { shape: f64, scale: f64 },
    /// Uniform pick among `values`.
    Choice { values: Vec<f64> },
    /// Replays `values` in order, cycling back to the start when exhausted.
    Sequence { values: Vec<f64> },
}

impl Distribution {
    pub fn constant(value: f64) -> Result<Self, DistributionError> {
        Self::checked(Distribution::Constant { value })
    }

    pub fn uniform(min: f64, max: f64) -> Result<Self, DistributionError> {
        Self::checked(Distribution::Uniform { min, max })
    }

    pub fn triangular(min: f64, mode: f64, max: f64) -> Result<Self, DistributionError> {
        Self::checked(Distribution::Triangular { min, mode, max })
    }

    pub fn normal(mean: f64, std: f64) -> Result<Self, DistributionError> {
        Self::checked(Distribution::Normal { mean, std })
    }

    pub fn exponential(mean: f64, min: f64) -> Result<Self, DistributionError> {
        Self::checked(Distribution::Exponential { mean, min })
    }

    pub fn beta(alpha: f64, beta: f64, min: f64, max: f64) -> Result<Self, DistributionError> {
        Self::checked(Distribution::Beta { alpha, beta, min, max })
    }

    pub fn gamma(shape: f64, scale: f64) -> Result<Self, DistributionError> {
        Self::checked(Distribution::Gamma { shape, scale })
    }

    pub fn weibull(shape: f64, scale: f64) -> Result<Self, DistributionError> {
        Self::checked(Distribution::Weibull { shape, scale })
    }

    pub fn choice(values: Vec<f64>) -> Result<Self, DistributionError> {
        Self::checked(Distribution::Choice { values })
    }

    pub fn sequence(values: Vec<f64>) -> Result<Self, DistributionError> {
        Self::checked(Distribution::Sequence { values })
    }

    fn checked(dist: Self) -> Result<Self, DistributionError> {
        dist.validate()?;
        Ok(dist)
    }

    /// Check the parameters against the distribution's contract.
    pub fn validate(&self) -> Result<(), DistributionError> {
        match self {
            Distribution::Constant { value } => non_negative("value", *value),
            Distribution::Uniform { min, max } => {
                finite("min", *min)?;
                finite("max", *max)?;
                ordered("min", *min, "max", *max)
            }
            Distribution::Triangular { min, mode, max } => {
                finite("min", *min)?;
                finite("mode", *mode)?;
                finite("max", *max)?;
                ordered("min", *min, "mode", *mode)?;
                ordered("mode", *mode, "max", *max)?;
                strictly_ordered("min", *min, "max", *max)
            }
            Distribution::Normal { mean, std } => {
                finite("mean", *mean)?;
                positive("std", *std)
            }
            Distribution::Exponential { mean, min } => {
                non_negative("min", *min)?;
                finite("mean", *mean)?;
                strictly_ordered("min", *min, "mean", *mean)
            }
            Distribution::Beta { alpha, beta, min, max } => {
                positive("alpha", *alpha)?;
                positive("beta", *beta)?;
                finite("min", *min)?;
                finite("max", *max)?;
                strictly_ordered("min", *min, "max", *max)
            }
            Distribution::Gamma { shape, scale } | Distribution::Weibull { shape, scale } => {
                positive("shape", *shape)?;
                positive("scale", *scale)
            }
            Distribution::Choice { values } => {
                if values.is_empty() {
                    return Err(DistributionError::Empty("values"));
                }
                values.iter().try_for_each(|v| finite("values", *v))
            }
            Distribution::Sequence { values } => {
                if values.is_empty() {
                    return Err(DistributionError::Empty("values"));
                }
                values.iter().try_for_each(|v| finite("values", *v))
            }
        }
    }

    /// Whether a draw can be strictly positive.
    ///
    /// Durations clamp negative draws to zero, so a distribution for which
    /// this is false only ever yields zero-length durations.
    pub fn can_draw_positive(&self) -> bool {
        match self {
            Distribution::Constant { value } => *value > 0.0,
            Distribution::Uniform { max, .. }
            | Distribution::Triangular { max, .. }
            | Distribution::Beta { max, .. } => *max > 0.0,
            Distribution::Choice { values } | Distribution::Sequence { values } => values.iter().any(|v| *v > 0.0),
            Distribution::Normal { .. }
            | Distribution::Exponential { .. }
            | Distribution::Gamma { .. }
            | Distribution::Weibull { .. } => true,
        }
    }

    /// Build a sampler for this distribution backed by an RNG seeded with `seed`.
    pub fn sampler(&self, seed: u64) -> Result<DistSampler, DistributionError> {
        self.validate()?;
        let kernel = Kernel::build(self)?;
        Ok(DistSampler {
            distribution: self.clone(),
            kernel,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl From<f64> for Distribution {
    fn from(value: f64) -> Self {
        Distribution::Constant { value }
    }
}

fn finite(name: &'static str, value: f64) -> Result<(), DistributionError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DistributionError::NonFinite { name, value })
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), DistributionError> {
    finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(DistributionError::NonPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), DistributionError> {
    finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(DistributionError::Negative { name, value })
    }
}

fn ordered(lower: &'static str, lower_value: f64, upper: &'static str, upper_value: f64) -> Result<(), DistributionError> {
    if lower_value <= upper_value {
        Ok(())
    } else {
        Err(DistributionError::Inverted { lower, lower_value, upper, upper_value })
    }
}

fn strictly_ordered(lower: &'static str, lower_value: f64, upper: &'static str, upper_value: f64) -> Result<(), DistributionError> {
    if lower_value < upper_value {
        Ok(())
    } else {
        Err(DistributionError::Inverted { lower, lower_value, upper, upper_value })
    }
}

fn rejected(err: impl std::fmt::Display) -> DistributionError {
    DistributionError::Rejected(err.to_string())
}

/// Pre-built sampling state for one distribution.
#[derive(Debug, Clone)]
enum Kernel {
    Constant(f64),
    Uniform(rand_distr::Uniform<f64>),
    Triangular(rand_distr::Triangular<f64>),
    Normal(rand_distr::Normal<f64>),
    Exponential { exp: rand_distr::Exp<f64>, min: f64 },
    Beta { beta: rand_distr::Beta<f64>, min: f64, span: f64 },
    Gamma(rand_distr::Gamma<f64>),
    Weibull(rand_distr::Weibull<f64>),
    Choice(Vec<f64>),
    Sequence { values: Vec<f64>, cursor: usize },
}

impl Kernel {
    fn build(dist: &Distribution) -> Result<Self, DistributionError> {
        Ok(match dist {
            Distribution::Constant { value } => Kernel::Constant(*value),
            Distribution::Uniform { min, max } => Kernel::Uniform(rand_distr::Uniform::new_inclusive(*min, *max)),
            Distribution::Triangular { min, mode, max } => {
                Kernel::Triangular(rand_distr::Triangular::new(*min, *max, *mode).map_err(rejected)?)
            }
            Distribution::Normal { mean, std } => Kernel::Normal(rand_distr::Normal::new(*mean, *std).map_err(rejected)?),
            Distribution::Exponential { mean, min } => Kernel::Exponential {
                exp: rand_distr::Exp::new(1.0 / (mean - min)).map_err(rejected)?,
                min: *min,
            },
            Distribution::Beta { alpha, beta, min, max } => Kernel::Beta {
                beta: rand_distr::Beta::new(*alpha, *beta).map_err(rejected)?,
                min: *min,
                span: max - min,
            },
            Distribution::Gamma { shape, scale } => Kernel::Gamma(rand_distr::Gamma::new(*shape, *scale).map_err(rejected)?),
            Distribution::Weibull { shape, scale } => {
                Kernel::Weibull(rand_distr::Weibull::new(*scale, *shape).map_err(rejected)?)
            }
            Distribution::Choice { values } => Kernel::Choice(values.clone()),
            Distribution::Sequence { values } => Kernel::Sequence { values: values.clone(), cursor: 0 },
        })
    }

    fn draw(&mut self, rng: &mut StdRng) -> f64 {
        match self {
            Kernel::Constant(value) => *value,
            Kernel::Uniform(uniform) => rng.sample(&*uniform),
            Kernel::Triangular(triangular) => rng.sample(&*triangular),
            Kernel::Normal(normal) => rng.sample(&*normal),
            Kernel::Exponential { exp, min } => rng.sample(&*exp) + *min,
            Kernel::Beta { beta, min, span } => rng.sample(&*beta) * *span + *min,
            Kernel::Gamma(gamma) => rng.sample(&*gamma),
            Kernel::Weibull(weibull) => rng.sample(&*weibull),
            Kernel::Choice(values) => values[rng.gen_range(0..values.len())],
            Kernel::Sequence { values, cursor } => {
                let value = values[*cursor % values.len()];
                *cursor = (*cursor + 1) % values.len();
                value
            }
        }
    }
}

/// A [`Distribution`] bound to its own deterministic RNG.
#[derive(Debug, Clone)]
pub struct DistSampler {
    distribution: Distribution,
    kernel: Kernel,
    rng: StdRng,
}

impl DistSampler {
    /// The distribution this sampler draws from.
    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }
}

impl Sampler for DistSampler {
    fn sample(&mut self) -> f64 {
        self.kernel.draw(&mut self.rng)
    }
}
