//! Sources: create items and push them into the line

use crate::buffer::BufferHandle;
use crate::builder::{validate_non_empty, Validate, ValidationResult};
use crate::failure::{Failure, FailureController};
use crate::report::{Reportable, SourceReport};
use crate::station::{Intake, StationCore, StationEvent};
use crate::status::Status;
use line_core::{Component, Distribution, Key, Sampler, Scheduler, SimTime};
use line_metrics::Stats;
use serde::{Deserialize, Serialize};

/// Description of a source in a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    /// Time to create one item.
    pub creation_time: Distribution,
    pub output_buffer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl Source {
    pub fn new(name: impl Into<String>, creation_time: impl Into<Distribution>, output_buffer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_time: creation_time.into(),
            output_buffer: output_buffer.into(),
            failure: None,
        }
    }

    pub fn with_failure(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }
}

impl Validate for Source {
    fn validate(&self) -> ValidationResult<()> {
        validate_non_empty("name", &self.name)?;
        validate_non_empty("output_buffer", &self.output_buffer)
    }
}

/// Running source, registered as a simulation component.
///
/// Never starves; its report has no starving time.
#[derive(Debug)]
pub struct SourceStation {
    core: StationCore,
}

impl SourceStation {
    pub fn new(
        name: impl Into<String>,
        output: BufferHandle,
        creation_time: Box<dyn Sampler>,
        failure: Option<FailureController>,
    ) -> Self {
        Self {
            core: StationCore::new(name.into(), Intake::Create { issued: 0 }, output, creation_time, failure),
        }
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Items created so far, delivered or not.
    pub fn items_created(&self) -> u64 {
        self.core.items_processed()
    }

    pub fn status(&self) -> Option<Status> {
        self.core.status()
    }

    pub fn stats(&self, status: Status) -> &Stats {
        self.core.stats(status)
    }

    /// True while a created item is waiting for room downstream.
    pub fn holds_undelivered(&self) -> bool {
        self.core.holds_finished()
    }

    pub fn finalize(&mut self, now: SimTime) {
        self.core.finalize(now);
    }
}

impl Component for SourceStation {
    type Event = StationEvent;

    fn process_event(&mut self, self_id: Key<StationEvent>, event: &StationEvent, scheduler: &mut Scheduler) {
        self.core.handle(self_id, event, scheduler);
    }
}

impl Reportable for SourceStation {
    type Report = SourceReport;

    fn name(&self) -> &str {
        self.core.name()
    }

    fn report(&self) -> SourceReport {
        SourceReport {
            name: self.core.name().to_string(),
            items_processed: self.core.items_processed(),
            failures: self.core.failures(),
            time_processing: self.core.stats(Status::Processing).clone(),
            time_blocked: self.core.stats(Status::Blocked).clone(),
            time_broken: self.core.stats(Status::Failed).clone(),
            holds_undelivered: self.core.holds_finished(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferState;
    use crate::failure::ResumePolicy;
    use line_core::{Execute, Executor, Simulation};
    use std::time::Duration;

    fn sampler(values: &[f64]) -> Box<dyn Sampler> {
        Box::new(Distribution::sequence(values.to_vec()).unwrap().sampler(0).unwrap())
    }

    #[test]
    fn test_source_blocks_on_full_buffer() {
        let mut sim = Simulation::default();
        let output = BufferState::new("out", 2).into_handle();
        let key = sim.add_component(SourceStation::new("s", output.clone(), sampler(&[1.0]), None));
        sim.schedule(SimTime::zero(), key, StationEvent::Start);
        sim.execute(Executor::timed(SimTime::from_secs(10)));

        let mut source: SourceStation = sim.remove_component(key).unwrap();
        source.finalize(sim.time());
        assert_eq!(source.items_created(), 3);
        assert!(source.holds_undelivered());
        assert_eq!(output.borrow().len(), 2);
        assert_eq!(source.stats(Status::Blocked).total(), Duration::from_secs(7));
        assert_eq!(source.stats(Status::Processing).total(), Duration::from_secs(3));
        assert!(source.stats(Status::Starving).is_empty());
        assert_eq!(source.status(), None);
    }

    #[test]
    fn test_source_reset_replays_creation_time() {
        let mut sim = Simulation::default();
        let output = BufferState::new("out", 10).into_handle();
        let failure = FailureController::time_based(sampler(&[2.0, 1000.0]), sampler(&[1.0]), ResumePolicy::Reset);
        let key = sim.add_component(SourceStation::new("s", output.clone(), sampler(&[5.0]), Some(failure)));
        sim.schedule(SimTime::zero(), key, StationEvent::Start);
        sim.execute(Executor::timed(SimTime::from_secs(8)));

        // Breakdown at 2, repaired at 3, full five units again until 8.
        assert_eq!(output.borrow().len(), 1);
        let source: SourceStation = sim.remove_component(key).unwrap();
        let report = source.report();
        assert_eq!(report.items_processed, 1);
        assert_eq!(report.time_broken.values(), &[Duration::from_secs(1)]);
        assert_eq!(report.time_processing.values(), &[Duration::from_secs(2), Duration::from_secs(5)]);
    }

    #[test]
    fn test_source_validation() {
        assert!(Source::new("s", 1.0, "a").validate().is_ok());
        assert!(Source::new("s", 1.0, "").validate().is_err());
    }
}
