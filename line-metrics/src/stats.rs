use line_core::SimTime;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

/// Closed visits to one state: their total and each individual duration, in
/// the order they were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    total: Duration,
    values: Vec<Duration>,
}

static EMPTY_STATS: Stats = Stats::EMPTY;

impl Stats {
    pub const EMPTY: Stats = Stats {
        total: Duration::ZERO,
        values: Vec::new(),
    };

    pub fn record(&mut self, duration: Duration) {
        self.total += duration;
        self.values.push(duration);
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Visit durations in recording order.
    pub fn values(&self) -> &[Duration] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Shortest visit, zero when there were none.
    pub fn min(&self) -> Duration {
        self.values.iter().copied().min().unwrap_or_default()
    }

    /// Longest visit, zero when there were none.
    pub fn max(&self) -> Duration {
        self.values.iter().copied().max().unwrap_or_default()
    }

    /// Mean visit duration, zero when there were none.
    pub fn mean(&self) -> Duration {
        if self.values.is_empty() {
            return Duration::ZERO;
        }
        Duration::from_nanos((self.total.as_nanos() / self.values.len() as u128) as u64)
    }

    /// The `p`-th percentile (0 to 100) of the visit durations.
    ///
    /// Interpolates linearly between the two closest ranks. `p` is clamped to
    /// `[0, 100]`; an empty set yields zero.
    pub fn percentile(&self, p: f64) -> Duration {
        if self.values.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted = self.values.clone();
        sorted.sort_unstable();

        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
        let rank = p / 100.0 * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let lo = sorted[lower].as_nanos() as f64;
        let hi = sorted[upper].as_nanos() as f64;
        Duration::from_nanos((lo + (hi - lo) * (rank - lower as f64)).round() as u64)
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}

impl Serialize for Stats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let values: Vec<f64> = self.values.iter().map(Duration::as_secs_f64).collect();
        let mut state = serializer.serialize_struct("Stats", 2)?;
        state.serialize_field("total", &self.total.as_secs_f64())?;
        state.serialize_field("values", &values)?;
        state.end()
    }
}

/// Fixed set of derived figures for one state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSummary {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub std_dev: f64,
}

impl From<&Stats> for StatsSummary {
    fn from(stats: &Stats) -> Self {
        if stats.is_empty() {
            return Self::default();
        }
        let mean = stats.mean().as_secs_f64();
        let variance = stats
            .values()
            .iter()
            .map(|d| {
                let diff = d.as_secs_f64() - mean;
                diff * diff
            })
            .sum::<f64>()
            / stats.len() as f64;

        Self {
            count: stats.len(),
            total: stats.total().as_secs_f64(),
            mean,
            min: stats.min().as_secs_f64(),
            max: stats.max().as_secs_f64(),
            p50: stats.percentile(50.0).as_secs_f64(),
            p95: stats.percentile(95.0).as_secs_f64(),
            std_dev: variance.sqrt(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} total={:.3} mean={:.3} min={:.3} max={:.3} p95={:.3}",
            self.count, self.total, self.mean, self.min, self.max, self.p95
        )
    }
}

/// Per-station accumulator of time spent in each state.
///
/// At most one state is open at a time. Entering a state closes the open
/// one, recording `now - entry time` even when that is zero.
/// [`StatTracker::finalize`] closes the last interval exactly once, after
/// which the tracker is read-only.
#[derive(Debug, Clone)]
pub struct StatTracker<S: Copy + Ord + fmt::Debug> {
    stats: BTreeMap<S, Stats>,
    open: Option<(S, SimTime)>,
    started_at: Option<SimTime>,
    finalized: bool,
}

impl<S: Copy + Ord + fmt::Debug> Default for StatTracker<S> {
    fn default() -> Self {
        Self {
            stats: BTreeMap::new(),
            open: None,
            started_at: None,
            finalized: false,
        }
    }
}

impl<S: Copy + Ord + fmt::Debug> StatTracker<S> {
    /// Tracker that reports every state in `states`, visited or not.
    pub fn with_states(states: impl IntoIterator<Item = S>) -> Self {
        Self {
            stats: states.into_iter().map(|s| (s, Stats::default())).collect(),
            ..Self::default()
        }
    }

    /// Close the open interval (if any) at `now` and open `state`.
    ///
    /// Returns the closed state and its duration. Ignored once finalized.
    pub fn enter(&mut self, state: S, now: SimTime) -> Option<(S, Duration)> {
        if self.finalized {
            return None;
        }
        let closed = self.close(now);
        self.started_at.get_or_insert(now);
        self.open = Some((state, now));
        trace!(?state, %now, "State entered");
        closed
    }

    /// Append a closed visit directly.
    pub fn record(&mut self, state: S, duration: Duration) {
        self.stats.entry(state).or_default().record(duration);
    }

    fn close(&mut self, now: SimTime) -> Option<(S, Duration)> {
        let (state, since) = self.open.take()?;
        let elapsed = now.duration_since(since);
        self.record(state, elapsed);
        Some((state, elapsed))
    }

    /// Close the open interval at the end of the run.
    ///
    /// Only the first call has an effect; returns whether it was that call.
    pub fn finalize(&mut self, now: SimTime) -> bool {
        if self.finalized {
            return false;
        }
        let closed = self.close(now);
        self.finalized = true;
        debug!(?closed, %now, "Stat tracker finalized");
        true
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The state currently open, if any.
    pub fn current(&self) -> Option<S> {
        self.open.map(|(state, _)| state)
    }

    /// Time spent so far in the open state.
    pub fn elapsed(&self, now: SimTime) -> Duration {
        self.open.map(|(_, since)| now.duration_since(since)).unwrap_or_default()
    }

    /// When the first state was entered.
    pub fn started_at(&self) -> Option<SimTime> {
        self.started_at
    }

    pub fn stats(&self, state: S) -> &Stats {
        self.stats.get(&state).unwrap_or(&EMPTY_STATS)
    }

    pub fn total(&self, state: S) -> Duration {
        self.stats(state).total()
    }

    /// Sum of all closed visits across states.
    pub fn grand_total(&self) -> Duration {
        self.stats.values().map(Stats::total).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (S, &Stats)> {
        self.stats.iter().map(|(state, stats)| (*state, stats))
    }
}
