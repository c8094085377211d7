//! Failure models and the per-station controller that drives them
//!
//! A [`Failure`] describes when a station breaks down and how long the repair
//! takes. At run start each configured station gets a [`FailureController`]
//! with its own sampling streams. The controller never touches station state
//! itself: it schedules [`StationEvent::Interrupt`] events in the interrupt
//! class, so a breakdown due at the same instant as the station's own
//! completion is handled first.

use crate::station::{StationEvent, WaitId};
use line_core::ids::derive_seed;
use line_core::{Distribution, DistributionError, Key, Sampler, Scheduler, SimTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

const STREAM_TRIGGER: u64 = 1;
const STREAM_REPAIR: u64 = 2;

/// What makes a station fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureTrigger {
    /// Fails after a drawn amount of processing time, counted across items.
    TimeBased { time_between_failures: Distribution },
    /// Fails after a drawn number of completed items.
    CountBased { items_between_failures: Distribution },
}

/// How interrupted processing continues after repair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Start the interrupted processing over with its full duration.
    Reset,
    /// Finish the time that was left when the failure hit.
    #[default]
    Resume,
}

/// Failure description attached to a source or machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub trigger: FailureTrigger,
    pub time_to_repair: Distribution,
    #[serde(default)]
    pub resume: ResumePolicy,
}

impl Failure {
    pub fn time_based(time_between_failures: impl Into<Distribution>, time_to_repair: impl Into<Distribution>) -> Self {
        Self {
            trigger: FailureTrigger::TimeBased {
                time_between_failures: time_between_failures.into(),
            },
            time_to_repair: time_to_repair.into(),
            resume: ResumePolicy::default(),
        }
    }

    pub fn count_based(items_between_failures: impl Into<Distribution>, time_to_repair: impl Into<Distribution>) -> Self {
        Self {
            trigger: FailureTrigger::CountBased {
                items_between_failures: items_between_failures.into(),
            },
            time_to_repair: time_to_repair.into(),
            resume: ResumePolicy::default(),
        }
    }

    pub fn with_policy(mut self, resume: ResumePolicy) -> Self {
        self.resume = resume;
        self
    }

    /// Check every distribution. A time-based trigger must be able to draw a
    /// positive interval, otherwise the station would break down without ever
    /// processing.
    pub fn validate(&self) -> Result<(), DistributionError> {
        match &self.trigger {
            FailureTrigger::TimeBased { time_between_failures } => {
                time_between_failures.validate()?;
                if !time_between_failures.can_draw_positive() {
                    return Err(DistributionError::NeverPositive("time_between_failures"));
                }
            }
            FailureTrigger::CountBased { items_between_failures } => items_between_failures.validate()?,
        }
        self.time_to_repair.validate()
    }

    /// Controller for the station registered at `owner`, seeded from the line seed.
    pub fn controller(&self, seed: u64, owner: u64) -> Result<FailureController, DistributionError> {
        let repair = Box::new(self.time_to_repair.sampler(derive_seed(seed, owner, STREAM_REPAIR))?);
        let trigger_seed = derive_seed(seed, owner, STREAM_TRIGGER);
        Ok(match &self.trigger {
            FailureTrigger::TimeBased { time_between_failures } => FailureController::time_based(
                Box::new(time_between_failures.sampler(trigger_seed)?),
                repair,
                self.resume,
            ),
            FailureTrigger::CountBased { items_between_failures } => FailureController::count_based(
                Box::new(items_between_failures.sampler(trigger_seed)?),
                repair,
                self.resume,
            ),
        })
    }
}

enum TriggerState {
    TimeBased {
        between: Box<dyn Sampler>,
        budget: Duration,
        /// Processing time was charged since the last breakdown.
        worked: bool,
    },
    CountBased {
        between: Box<dyn Sampler>,
        threshold: u64,
        completed: u64,
    },
}

/// Live failure state of one station.
pub struct FailureController {
    trigger: TriggerState,
    repair: Box<dyn Sampler>,
    policy: ResumePolicy,
}

impl fmt::Debug for FailureController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("FailureController");
        match &self.trigger {
            TriggerState::TimeBased { budget, .. } => out.field("budget", budget),
            TriggerState::CountBased { threshold, completed, .. } => {
                out.field("threshold", threshold).field("completed", completed)
            }
        };
        out.field("policy", &self.policy).finish()
    }
}

impl FailureController {
    /// Fails once `between` worth of processing time has elapsed.
    pub fn time_based(mut between: Box<dyn Sampler>, repair: Box<dyn Sampler>, policy: ResumePolicy) -> Self {
        let budget = between.sample_duration();
        Self {
            trigger: TriggerState::TimeBased {
                between,
                budget,
                worked: true,
            },
            repair,
            policy,
        }
    }

    /// Fails once `between` items have been completed.
    pub fn count_based(mut between: Box<dyn Sampler>, repair: Box<dyn Sampler>, policy: ResumePolicy) -> Self {
        let threshold = between.sample_count();
        Self {
            trigger: TriggerState::CountBased {
                between,
                threshold,
                completed: 0,
            },
            repair,
            policy,
        }
    }

    pub fn policy(&self) -> ResumePolicy {
        self.policy
    }

    /// Processing time left before a time-based failure, if time-based.
    pub fn budget(&self) -> Option<Duration> {
        match &self.trigger {
            TriggerState::TimeBased { budget, .. } => Some(*budget),
            TriggerState::CountBased { .. } => None,
        }
    }

    /// Called when the station starts (or restarts) processing for `remaining`.
    ///
    /// Schedules the breakdown if the budget runs out within that time. The
    /// interrupt carries `wait`, so it is void once processing has ended.
    ///
    /// A zero budget is not armed again before some processing time has been
    /// charged after the previous breakdown, so virtual time always advances
    /// between two breakdowns.
    pub fn arm(&mut self, remaining: Duration, station: Key<StationEvent>, wait: WaitId, scheduler: &mut Scheduler) {
        if let TriggerState::TimeBased { budget, worked, .. } = &self.trigger {
            if budget.is_zero() && !*worked {
                debug!("Zero breakdown budget deferred until processing time elapses");
                return;
            }
            if *budget <= remaining {
                debug!(budget = ?budget, "Breakdown armed within current processing");
                scheduler.schedule_interrupt(
                    SimTime::from_duration(*budget),
                    station,
                    StationEvent::Interrupt { wait: Some(wait) },
                );
            }
        }
    }

    /// Charge processing time against the budget.
    pub fn consume(&mut self, elapsed: Duration) {
        if let TriggerState::TimeBased { budget, worked, .. } = &mut self.trigger {
            *budget = budget.saturating_sub(elapsed);
            *worked |= !elapsed.is_zero();
        }
    }

    /// Called after each completed item; schedules a breakdown when the count is reached.
    pub fn item_completed(&mut self, station: Key<StationEvent>, scheduler: &mut Scheduler) {
        if let TriggerState::CountBased {
            between,
            threshold,
            completed,
        } = &mut self.trigger
        {
            *completed += 1;
            if *completed >= *threshold {
                debug!(completed = *completed, "Item count reached, breaking down");
                *completed = 0;
                *threshold = between.sample_count();
                scheduler.schedule_interrupt(SimTime::zero(), station, StationEvent::Interrupt { wait: None });
            }
        }
    }

    /// Called when a breakdown took effect.
    pub fn fired(&mut self) {
        if let TriggerState::TimeBased { between, budget, worked } = &mut self.trigger {
            if budget.is_zero() {
                *budget = between.sample_duration();
            }
            *worked = false;
        }
    }

    pub fn repair_time(&mut self) -> Duration {
        self.repair.sample_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(values: &[f64]) -> Box<dyn Sampler> {
        Box::new(Distribution::sequence(values.to_vec()).unwrap().sampler(0).unwrap())
    }

    #[test]
    fn test_time_budget_is_consumed_and_redrawn() {
        let mut controller = FailureController::time_based(sampler(&[4.0, 7.0]), sampler(&[3.0]), ResumePolicy::Reset);
        assert_eq!(controller.budget(), Some(Duration::from_secs(4)));

        controller.consume(Duration::from_secs(1));
        controller.fired();
        assert_eq!(controller.budget(), Some(Duration::from_secs(3)));

        controller.consume(Duration::from_secs(3));
        controller.fired();
        assert_eq!(controller.budget(), Some(Duration::from_secs(7)));
        assert_eq!(controller.repair_time(), Duration::from_secs(3));
        assert_eq!(controller.policy(), ResumePolicy::Reset);
    }

    #[test]
    fn test_count_trigger_fires_on_threshold() {
        let mut scheduler = Scheduler::default();
        let key = Key::new_with_id(line_core::ids::deterministic_uuid(1, 2, 3));
        let mut controller = FailureController::count_based(sampler(&[2.0, 1.0]), sampler(&[1.0]), ResumePolicy::Resume);

        controller.item_completed(key, &mut scheduler);
        assert_eq!(scheduler.pending_events(), 0);
        controller.item_completed(key, &mut scheduler);
        assert_eq!(scheduler.pending_events(), 1);
        controller.item_completed(key, &mut scheduler);
        assert_eq!(scheduler.pending_events(), 2);
        assert_eq!(controller.budget(), None);
    }

    #[test]
    fn test_arm_only_when_budget_expires_in_time() {
        let mut scheduler = Scheduler::default();
        let key = Key::new_with_id(line_core::ids::deterministic_uuid(1, 2, 3));
        let mut controller = FailureController::time_based(sampler(&[5.0]), sampler(&[1.0]), ResumePolicy::Resume);

        controller.arm(Duration::from_secs(4), key, WaitId(1), &mut scheduler);
        assert_eq!(scheduler.pending_events(), 0);
        controller.arm(Duration::from_secs(5), key, WaitId(2), &mut scheduler);
        let entry = scheduler.pop().unwrap();
        assert_eq!(entry.time(), SimTime::from_secs(5));
        assert_eq!(entry.class(), line_core::EventClass::Interrupt);
    }

    #[test]
    fn test_zero_budget_waits_for_processing_after_breakdown() {
        let mut scheduler = Scheduler::default();
        let key = Key::new_with_id(line_core::ids::deterministic_uuid(1, 2, 3));
        let mut controller = FailureController::time_based(sampler(&[0.0]), sampler(&[0.0]), ResumePolicy::Resume);

        controller.arm(Duration::from_secs(5), key, WaitId(1), &mut scheduler);
        assert_eq!(scheduler.pop().map(|entry| entry.time()), Some(SimTime::zero()));
        controller.consume(Duration::ZERO);
        controller.fired();

        // Restarted at the same instant: no second breakdown yet.
        controller.arm(Duration::from_secs(5), key, WaitId(2), &mut scheduler);
        assert_eq!(scheduler.pending_events(), 0);

        controller.consume(Duration::from_secs(5));
        controller.arm(Duration::from_secs(5), key, WaitId(3), &mut scheduler);
        assert_eq!(scheduler.pending_events(), 1);
    }

    #[test]
    fn test_time_trigger_must_draw_positive_intervals() {
        assert_eq!(
            Failure::time_based(0.0, 0.0).validate(),
            Err(DistributionError::NeverPositive("time_between_failures"))
        );
        let never = Distribution::sequence(vec![0.0, 0.0]).unwrap();
        assert!(Failure::time_based(never, 2.0).validate().is_err());

        assert!(Failure::time_based(Distribution::sequence(vec![0.0, 5.0]).unwrap(), 0.0)
            .validate()
            .is_ok());
        assert!(Failure::count_based(1.0, 0.0).validate().is_ok());
    }

    #[test]
    fn test_failure_description_json() {
        let failure = Failure::time_based(Distribution::exponential(50.0, 0.0).unwrap(), 3.0).with_policy(ResumePolicy::Reset);
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["trigger"]["type"], "time_based");
        assert_eq!(json["resume"], "reset");

        let parsed: Failure = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, failure);
        assert!(parsed.validate().is_ok());

        let bad = Failure::count_based(Distribution::Uniform { min: 5.0, max: 1.0 }, 1.0);
        assert!(bad.validate().is_err());
    }
}
