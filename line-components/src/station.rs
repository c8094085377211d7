//! Station state machine shared by sources and machines
//!
//! A station is an explicit finite-state machine driven by its own
//! [`StationEvent`]s. Every time it suspends (on a timer, a buffer or a
//! repair) it takes a fresh [`WaitId`]; an event carrying any other id
//! belongs to a wait the station already left and is ignored. That is how a
//! failure interrupt cancels the pending completion, wake-up or timer without
//! removing anything from the scheduler.
//!
//! The cycle is:
//!
//! ```text
//!   machine: Starving (get) -> Processing (timer) -> Blocked (put) -> Starving
//!   source:                    Processing (timer) -> Blocked (put) -> Processing
//! ```
//!
//! and any suspension can be pre-empted by `Failed` (repair timer), after
//! which the interrupted activity resumes according to the [`ResumePolicy`].

use crate::buffer::{BufferHandle, Token, Waiter};
use crate::failure::{FailureController, ResumePolicy};
use crate::status::Status;
use line_core::logging::{diagnostics, events};
use line_core::{station_span, Key, Sampler, Scheduler, SimTime};
use line_metrics::{StatTracker, Stats};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Identifies one suspension of a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaitId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationEvent {
    /// Begin the first cycle.
    Start,
    /// A processing or creation timer ran out.
    TimerElapsed { wait: WaitId },
    /// A buffer operation may now succeed.
    Wake { wait: WaitId },
    /// Break down. `None` interrupts whatever the station is waiting on.
    Interrupt { wait: Option<WaitId> },
    RepairDone { wait: WaitId },
}

/// Where a station gets its items from.
pub(crate) enum Intake {
    /// Items are created; `issued` counts them.
    Create { issued: u64 },
    /// Items are taken from an upstream buffer.
    Pull(BufferHandle),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Getting,
    Working {
        original: Duration,
        remaining: Duration,
        since: SimTime,
    },
    Putting,
    Repairing { resume: Resume },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resume {
    Get,
    Work { original: Duration, remaining: Duration },
    Put,
}

pub(crate) struct StationCore {
    name: String,
    intake: Intake,
    output: BufferHandle,
    processing: Box<dyn Sampler>,
    failure: Option<FailureController>,
    tracker: StatTracker<Status>,
    phase: Phase,
    wait: WaitId,
    token: Option<Token>,
    items_processed: u64,
    failures: u64,
}

impl fmt::Debug for StationCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationCore")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("wait", &self.wait)
            .field("token", &self.token)
            .field("items_processed", &self.items_processed)
            .field("failures", &self.failures)
            .finish()
    }
}

impl StationCore {
    pub(crate) fn new(
        name: String,
        intake: Intake,
        output: BufferHandle,
        processing: Box<dyn Sampler>,
        failure: Option<FailureController>,
    ) -> Self {
        let tracker = match intake {
            Intake::Create { .. } => StatTracker::with_states([Status::Processing, Status::Blocked, Status::Failed]),
            Intake::Pull(_) => StatTracker::with_states(Status::ALL),
        };
        Self {
            name,
            intake,
            output,
            processing,
            failure,
            tracker,
            phase: Phase::Idle,
            wait: WaitId(0),
            token: None,
            items_processed: 0,
            failures: 0,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn items_processed(&self) -> u64 {
        self.items_processed
    }

    pub(crate) fn failures(&self) -> u64 {
        self.failures
    }

    pub(crate) fn status(&self) -> Option<Status> {
        self.tracker.current()
    }

    pub(crate) fn stats(&self, status: Status) -> &Stats {
        self.tracker.stats(status)
    }

    /// Holds an item it has not finished processing.
    pub(crate) fn holds_unprocessed(&self) -> bool {
        self.token.is_some()
            && matches!(
                self.phase,
                Phase::Working { .. } | Phase::Repairing {
                    resume: Resume::Work { .. }
                }
            )
    }

    /// Holds a finished item it could not deliver yet.
    pub(crate) fn holds_finished(&self) -> bool {
        self.token.is_some()
            && matches!(
                self.phase,
                Phase::Putting | Phase::Repairing { resume: Resume::Put }
            )
    }

    /// Close the open state at the end of the run.
    pub(crate) fn finalize(&mut self, now: SimTime) {
        if self.tracker.finalize(now) {
            debug!(station = %self.name, items = self.items_processed, %now, "Station finalized");
        }
    }

    pub(crate) fn handle(&mut self, key: Key<StationEvent>, event: &StationEvent, scheduler: &mut Scheduler) {
        let _span = station_span(&self.name, scheduler.time()).entered();
        match *event {
            StationEvent::Start => {
                if self.phase == Phase::Idle {
                    self.begin_cycle(key, scheduler);
                }
            }
            StationEvent::TimerElapsed { wait } => match self.phase {
                Phase::Working { .. } if wait == self.wait => self.finish_work(key, scheduler),
                _ => self.stale(wait),
            },
            StationEvent::Wake { wait } => match self.phase {
                Phase::Getting if wait == self.wait => self.attempt_get(key, scheduler),
                Phase::Putting if wait == self.wait => self.attempt_put(key, scheduler),
                _ => {
                    self.stale(wait);
                    self.relay(scheduler);
                }
            },
            StationEvent::Interrupt { wait } => {
                let targeted = wait.map_or(true, |w| w == self.wait);
                match self.phase {
                    Phase::Getting | Phase::Working { .. } | Phase::Putting if targeted => self.fail(key, scheduler),
                    _ => trace!(station = %self.name, ?wait, phase = ?self.phase, "Interrupt ignored"),
                }
            }
            StationEvent::RepairDone { wait } => match self.phase {
                Phase::Repairing { resume } if wait == self.wait => self.repair_done(key, resume, scheduler),
                _ => self.stale(wait),
            },
        }
    }

    fn next_wait(&mut self) -> WaitId {
        self.wait = WaitId(self.wait.0 + 1);
        self.wait
    }

    fn stale(&self, wait: WaitId) {
        diagnostics::stale_wakeup(&self.name, wait.0, self.wait.0);
    }

    fn transition(&mut self, to: Status, now: SimTime) {
        let from = self.tracker.enter(to, now).map_or("idle", |(state, _)| state.as_str());
        events::station_state_changed(&self.name, from, to.as_str(), now);
    }

    fn begin_cycle(&mut self, key: Key<StationEvent>, scheduler: &mut Scheduler) {
        match self.intake {
            Intake::Pull(_) => {
                self.transition(Status::Starving, scheduler.time());
                self.attempt_get(key, scheduler);
            }
            Intake::Create { .. } => {
                let duration = self.processing.sample_duration();
                self.start_work(key, duration, duration, scheduler);
            }
        }
    }

    fn attempt_get(&mut self, key: Key<StationEvent>, scheduler: &mut Scheduler) {
        let Intake::Pull(input) = &self.intake else {
            return;
        };
        let input = Rc::clone(input);
        let wait = self.next_wait();
        let taken = input.borrow_mut().try_get(scheduler);
        match taken {
            Some(token) => {
                self.token = Some(token);
                let duration = self.processing.sample_duration();
                self.start_work(key, duration, duration, scheduler);
            }
            None => {
                input.borrow_mut().wait_get(Waiter { station: key, wait });
                self.phase = Phase::Getting;
            }
        }
    }

    fn start_work(&mut self, key: Key<StationEvent>, original: Duration, remaining: Duration, scheduler: &mut Scheduler) {
        let now = scheduler.time();
        self.transition(Status::Processing, now);
        let wait = self.next_wait();
        scheduler.schedule(SimTime::from_duration(remaining), key, StationEvent::TimerElapsed { wait });
        if let Some(failure) = self.failure.as_mut() {
            failure.arm(remaining, key, wait, scheduler);
        }
        self.phase = Phase::Working {
            original,
            remaining,
            since: now,
        };
    }

    fn finish_work(&mut self, key: Key<StationEvent>, scheduler: &mut Scheduler) {
        let now = scheduler.time();
        if let (Phase::Working { since, .. }, Some(failure)) = (self.phase, self.failure.as_mut()) {
            failure.consume(now.duration_since(since));
        }
        self.items_processed += 1;
        metrics::counter!("linesim_items_processed", "station" => self.name.clone()).increment(1);

        if let Intake::Create { issued } = &mut self.intake {
            *issued += 1;
            self.token = Some(Token {
                id: *issued,
                created_at: now,
            });
        }
        if let Some(failure) = self.failure.as_mut() {
            failure.item_completed(key, scheduler);
        }
        self.transition(Status::Blocked, now);
        self.attempt_put(key, scheduler);
    }

    fn attempt_put(&mut self, key: Key<StationEvent>, scheduler: &mut Scheduler) {
        let wait = self.next_wait();
        let Some(token) = self.token.take() else {
            error!(station = %self.name, "Nothing to deliver, starting next cycle");
            self.begin_cycle(key, scheduler);
            return;
        };
        let output = Rc::clone(&self.output);
        let result = output.borrow_mut().try_put(token, scheduler);
        match result {
            Ok(()) => self.begin_cycle(key, scheduler),
            Err(token) => {
                self.token = Some(token);
                output.borrow_mut().wait_put(Waiter { station: key, wait });
                self.phase = Phase::Putting;
            }
        }
    }

    fn fail(&mut self, key: Key<StationEvent>, scheduler: &mut Scheduler) {
        let now = scheduler.time();
        let waiter = Waiter {
            station: key,
            wait: self.wait,
        };
        let resume = match self.phase {
            Phase::Getting => {
                if let Intake::Pull(input) = &self.intake {
                    input.borrow_mut().withdraw(waiter);
                }
                Resume::Get
            }
            Phase::Putting => {
                self.output.borrow_mut().withdraw(waiter);
                Resume::Put
            }
            Phase::Working {
                original,
                remaining,
                since,
            } => {
                let elapsed = now.duration_since(since);
                if let Some(failure) = self.failure.as_mut() {
                    failure.consume(elapsed);
                }
                Resume::Work {
                    original,
                    remaining: remaining.saturating_sub(elapsed),
                }
            }
            Phase::Idle | Phase::Repairing { .. } => return,
        };

        let interrupted = self.tracker.current().map_or("idle", |state| state.as_str());
        events::interrupt_delivered(&self.name, interrupted, now);
        self.transition(Status::Failed, now);
        self.failures += 1;
        metrics::counter!("linesim_failures", "station" => self.name.clone()).increment(1);

        let repair = match self.failure.as_mut() {
            Some(failure) => {
                failure.fired();
                failure.repair_time()
            }
            None => Duration::ZERO,
        };
        let wait = self.next_wait();
        scheduler.schedule(SimTime::from_duration(repair), key, StationEvent::RepairDone { wait });
        self.phase = Phase::Repairing { resume };
    }

    fn repair_done(&mut self, key: Key<StationEvent>, resume: Resume, scheduler: &mut Scheduler) {
        let now = scheduler.time();
        debug!(station = %self.name, ?resume, %now, "Repair completed");
        match resume {
            Resume::Get => {
                self.transition(Status::Starving, now);
                self.attempt_get(key, scheduler);
            }
            Resume::Put => {
                self.transition(Status::Blocked, now);
                self.attempt_put(key, scheduler);
            }
            Resume::Work { original, remaining } => {
                let policy = self.failure.as_ref().map_or(ResumePolicy::default(), FailureController::policy);
                let remaining = match policy {
                    ResumePolicy::Reset => original,
                    ResumePolicy::Resume => remaining,
                };
                self.start_work(key, original, remaining, scheduler);
            }
        }
    }

    fn relay(&self, scheduler: &mut Scheduler) {
        if let Intake::Pull(input) = &self.intake {
            input.borrow_mut().relay(scheduler);
        }
        self.output.borrow_mut().relay(scheduler);
    }
}
