//! Simulation time management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

const NANOS_PER_UNIT: f64 = 1_000_000_000.0;

/// Simulation time with nanosecond precision
///
/// SimTime represents a point in virtual time, stored as nanoseconds since
/// the simulation start. One "time unit" as drawn from a distribution maps to
/// one second of `SimTime`, so `SimTime::from(2.5)` is 2.5 units.
///
/// Fixed-point storage keeps interval arithmetic exact: the visits a station
/// records always add up to the horizon it was simulated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// Create a new SimTime at the simulation start (time zero)
    pub const fn zero() -> Self {
        SimTime(0)
    }

    /// Create a SimTime from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    /// Create a SimTime from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis * 1_000_000)
    }

    /// Create a SimTime from whole time units (seconds)
    pub const fn from_secs(secs: u64) -> Self {
        SimTime(secs * 1_000_000_000)
    }

    /// Create a SimTime from a Duration
    pub fn from_duration(duration: Duration) -> Self {
        SimTime(duration.as_nanos() as u64)
    }

    /// Convert a sampled value in time units into a SimTime.
    ///
    /// Unlike `From<f64>`, this never panics: negative and NaN samples become
    /// zero and values beyond the representable range saturate. Samplers feed
    /// arbitrary distribution output through here.
    pub fn from_units_saturating(units: f64) -> Self {
        if units.is_nan() || units <= 0.0 {
            return SimTime::zero();
        }
        let nanos = units * NANOS_PER_UNIT;
        if nanos >= u64::MAX as f64 {
            SimTime(u64::MAX)
        } else {
            SimTime(nanos.round() as u64)
        }
    }

    /// Convert SimTime to a Duration
    pub fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Get the raw nanosecond value
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// The time in (fractional) units.
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / NANOS_PER_UNIT
    }

    /// Calculate the duration since another SimTime
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Add a duration to this SimTime
    pub fn add_duration(&self, duration: Duration) -> Self {
        SimTime(self.0.saturating_add(duration.as_nanos() as u64))
    }

    /// Subtract a duration from this SimTime
    pub fn sub_duration(&self, duration: Duration) -> Self {
        SimTime(self.0.saturating_sub(duration.as_nanos() as u64))
    }
}

impl Add<SimTime> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        self.add_duration(rhs)
    }
}

impl Sub<Duration> for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        self.sub_duration(rhs)
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::zero()
    }
}

impl From<f64> for SimTime {
    /// Convert from time units (as f64) to SimTime
    ///
    /// # Examples
    /// ```
    /// # use line_core::SimTime;
    /// let time = SimTime::from(1.5);
    /// assert_eq!(time.as_nanos(), 1_500_000_000);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the input is negative, infinite, or NaN.
    fn from(secs: f64) -> Self {
        if !secs.is_finite() {
            panic!("SimTime cannot be created from non-finite value: {secs}");
        }
        if secs < 0.0 {
            panic!("SimTime cannot be negative: {secs}");
        }

        const MAX_SECS: f64 = (u64::MAX as f64) / NANOS_PER_UNIT;
        if secs > MAX_SECS {
            panic!("SimTime value too large: {secs} seconds (max: {MAX_SECS} seconds)");
        }

        SimTime::from_nanos((secs * NANOS_PER_UNIT).round() as u64)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.3}", self.as_secs_f64())
    }
}
