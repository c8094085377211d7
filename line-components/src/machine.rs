//! Machines: take an item from the input buffer, process it, pass it on

use crate::buffer::BufferHandle;
use crate::builder::{validate_non_empty, Validate, ValidationResult};
use crate::failure::{Failure, FailureController};
use crate::report::{MachineReport, Reportable};
use crate::station::{Intake, StationCore, StationEvent};
use crate::status::Status;
use line_core::{Component, Distribution, Key, Sampler, Scheduler, SimTime};
use line_metrics::Stats;
use serde::{Deserialize, Serialize};

/// Description of a machine in a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub name: String,
    pub processing_time: Distribution,
    pub input_buffer: String,
    pub output_buffer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl Machine {
    pub fn new(
        name: impl Into<String>,
        processing_time: impl Into<Distribution>,
        input_buffer: impl Into<String>,
        output_buffer: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            processing_time: processing_time.into(),
            input_buffer: input_buffer.into(),
            output_buffer: output_buffer.into(),
            failure: None,
        }
    }

    pub fn with_failure(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }
}

impl Validate for Machine {
    fn validate(&self) -> ValidationResult<()> {
        validate_non_empty("name", &self.name)?;
        validate_non_empty("input_buffer", &self.input_buffer)?;
        validate_non_empty("output_buffer", &self.output_buffer)
    }
}

/// Running machine, registered as a simulation component.
#[derive(Debug)]
pub struct MachineStation {
    core: StationCore,
}

impl MachineStation {
    pub fn new(
        name: impl Into<String>,
        input: BufferHandle,
        output: BufferHandle,
        processing_time: Box<dyn Sampler>,
        failure: Option<FailureController>,
    ) -> Self {
        Self {
            core: StationCore::new(name.into(), Intake::Pull(input), output, processing_time, failure),
        }
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn items_processed(&self) -> u64 {
        self.core.items_processed()
    }

    pub fn status(&self) -> Option<Status> {
        self.core.status()
    }

    pub fn stats(&self, status: Status) -> &Stats {
        self.core.stats(status)
    }

    /// True while an item taken from the input buffer is being worked on (or awaits repair).
    pub fn holds_unprocessed(&self) -> bool {
        self.core.holds_unprocessed()
    }

    pub fn finalize(&mut self, now: SimTime) {
        self.core.finalize(now);
    }
}

impl Component for MachineStation {
    type Event = StationEvent;

    fn process_event(&mut self, self_id: Key<StationEvent>, event: &StationEvent, scheduler: &mut Scheduler) {
        self.core.handle(self_id, event, scheduler);
    }
}

impl Reportable for MachineStation {
    type Report = MachineReport;

    fn name(&self) -> &str {
        self.core.name()
    }

    fn report(&self) -> MachineReport {
        MachineReport {
            name: self.core.name().to_string(),
            items_processed: self.core.items_processed(),
            failures: self.core.failures(),
            time_starved: self.core.stats(Status::Starving).clone(),
            time_processing: self.core.stats(Status::Processing).clone(),
            time_blocked: self.core.stats(Status::Blocked).clone(),
            time_broken: self.core.stats(Status::Failed).clone(),
            holds_unprocessed: self.core.holds_unprocessed(),
            holds_processed: self.core.holds_finished(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferState, Token};
    use crate::failure::ResumePolicy;
    use line_core::{Execute, Executor, Simulation};
    use std::time::Duration;

    fn sampler(values: &[f64]) -> Box<dyn Sampler> {
        Box::new(Distribution::sequence(values.to_vec()).unwrap().sampler(0).unwrap())
    }

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    /// One item waiting in the input buffer at t=0.
    fn machine_with_one_item(failure: Option<FailureController>) -> (Simulation, Key<StationEvent>, BufferHandle) {
        let mut sim = Simulation::default();
        let input = BufferState::new("in", 5).into_handle();
        let output = BufferState::new("out", 5).into_handle();
        input
            .borrow_mut()
            .try_put(
                Token {
                    id: 1,
                    created_at: SimTime::zero(),
                },
                &mut sim.scheduler,
            )
            .unwrap();
        let machine = MachineStation::new("m", input, output.clone(), sampler(&[10.0]), failure);
        let key = sim.add_component(machine);
        sim.schedule(SimTime::zero(), key, StationEvent::Start);
        (sim, key, output)
    }

    #[test]
    fn test_cycle_without_failure() {
        let (mut sim, key, output) = machine_with_one_item(None);
        sim.execute(Executor::timed(SimTime::from_secs(25)));

        let mut machine: MachineStation = sim.remove_component(key).unwrap();
        machine.finalize(sim.time());
        assert_eq!(machine.items_processed(), 1);
        assert_eq!(output.borrow().len(), 1);
        assert_eq!(machine.stats(Status::Starving).values(), secs(&[0, 15]).as_slice());
        assert_eq!(machine.stats(Status::Processing).values(), secs(&[10]).as_slice());
        assert_eq!(machine.stats(Status::Blocked).values(), secs(&[0]).as_slice());
        assert!(machine.stats(Status::Failed).is_empty());
    }

    #[test]
    fn test_interrupt_while_starving_resumes_waiting() {
        let mut sim = Simulation::default();
        let input = BufferState::new("in", 1).into_handle();
        let output = BufferState::new("out", 1).into_handle();
        let failure = FailureController::count_based(sampler(&[100.0]), sampler(&[2.0]), ResumePolicy::Resume);
        let machine = MachineStation::new("m", input.clone(), output, sampler(&[1.0]), Some(failure));
        let key = sim.add_component(machine);
        sim.schedule(SimTime::zero(), key, StationEvent::Start);
        sim.scheduler
            .schedule_interrupt(SimTime::from_secs(3), key, StationEvent::Interrupt { wait: None });
        sim.execute(Executor::timed(SimTime::from_secs(4)));

        assert_eq!(input.borrow().waiting_getters(), 0);
        let machine: &mut MachineStation = sim.get_component_mut(key).unwrap();
        assert_eq!(machine.status(), Some(Status::Failed));

        sim.execute(Executor::timed(SimTime::from_secs(10)));
        assert_eq!(input.borrow().waiting_getters(), 1);
        let mut machine: MachineStation = sim.remove_component(key).unwrap();
        machine.finalize(sim.time());
        assert_eq!(machine.stats(Status::Starving).values(), secs(&[3, 5]).as_slice());
        assert_eq!(machine.stats(Status::Failed).values(), secs(&[2]).as_slice());
    }

    #[test]
    fn test_interrupt_during_repair_is_ignored() {
        let failure = FailureController::time_based(sampler(&[4.0, 1000.0]), sampler(&[3.0]), ResumePolicy::Resume);
        let (mut sim, key, _) = machine_with_one_item(Some(failure));
        sim.scheduler
            .schedule_interrupt(SimTime::from_secs(5), key, StationEvent::Interrupt { wait: None });
        sim.execute(Executor::timed(SimTime::from_secs(20)));

        let mut machine: MachineStation = sim.remove_component(key).unwrap();
        machine.finalize(sim.time());
        assert_eq!(machine.stats(Status::Failed).values(), secs(&[3]).as_slice());
        assert_eq!(machine.stats(Status::Processing).values(), secs(&[4, 6]).as_slice());
        assert_eq!(machine.report().failures, 1);
    }

    #[test]
    fn test_zero_breakdown_interval_still_advances_time() {
        let failure = FailureController::time_based(sampler(&[0.0]), sampler(&[0.0]), ResumePolicy::Resume);
        let (mut sim, key, output) = machine_with_one_item(Some(failure));
        sim.execute(Executor::steps(1_000));

        assert!(!sim.has_pending_events());
        assert_eq!(sim.time(), SimTime::from_secs(10));
        assert_eq!(output.borrow().len(), 1);
        let machine: MachineStation = sim.remove_component(key).unwrap();
        assert_eq!(machine.items_processed(), 1);
        assert_eq!(machine.report().failures, 1);
        assert_eq!(machine.stats(Status::Processing).values(), secs(&[0, 10]).as_slice());
        assert_eq!(machine.stats(Status::Failed).values(), secs(&[0]).as_slice());
    }

    #[test]
    fn test_machine_validation() {
        assert!(Machine::new("m", 1.0, "a", "b").validate().is_ok());
        assert!(Machine::new("m", 1.0, "", "b").validate().is_err());
        assert!(Machine::new(" ", 1.0, "a", "b").validate().is_err());
    }
}
