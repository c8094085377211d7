use crate::{SimTime, Simulation};

/// Simulation execution trait.
pub trait Execute {
    /// Executes the simulation until some stopping condition is reached.
    /// The condition is implementation-specific.
    fn execute(self, sim: &mut Simulation);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndCondition {
    Time(SimTime),
    NoEvents,
    Steps(usize),
}

/// Executor is used for simple execution of an entire simulation.
///
/// See the crate level documentation for examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executor {
    end_condition: EndCondition,
}

impl Executor {
    /// Simulation will end only once there is no available events in the queue.
    #[must_use]
    pub fn unbound() -> Self {
        Self {
            end_condition: EndCondition::NoEvents,
        }
    }

    /// Run every event due at or before `time`, then leave the clock at `time`.
    ///
    /// Events due later stay queued.
    #[must_use]
    pub fn timed(time: SimTime) -> Self {
        Self {
            end_condition: EndCondition::Time(time),
        }
    }

    /// Simulation will execute exactly this many steps, unless we run out of events.
    #[must_use]
    pub fn steps(steps: usize) -> Self {
        Self {
            end_condition: EndCondition::Steps(steps),
        }
    }

    /// Registers a side effect that is called _after_ each simulation step.
    #[must_use]
    pub fn side_effect<F>(self, func: F) -> ExecutorWithSideEffect<F>
    where
        F: FnMut(&Simulation),
    {
        ExecutorWithSideEffect {
            end_condition: self.end_condition,
            side_effect: func,
        }
    }
}

impl Execute for Executor {
    fn execute(self, sim: &mut Simulation) {
        run_with(sim, self.end_condition, |_| {});
    }
}

pub struct ExecutorWithSideEffect<F>
where
    F: FnMut(&Simulation),
{
    end_condition: EndCondition,
    side_effect: F,
}

impl<F> Execute for ExecutorWithSideEffect<F>
where
    F: FnMut(&Simulation),
{
    fn execute(self, sim: &mut Simulation) {
        run_with(sim, self.end_condition, self.side_effect);
    }
}

fn run_with<F>(sim: &mut Simulation, end_condition: EndCondition, mut side_effect: F)
where
    F: FnMut(&Simulation),
{
    let mut step_fn = |sim: &mut Simulation| {
        let result = sim.step();
        if result {
            side_effect(sim);
        }
        result
    };
    match end_condition {
        EndCondition::Time(time) => {
            while sim.scheduler.peek().is_some_and(|e| e.time() <= time) {
                step_fn(sim);
            }
            sim.scheduler.advance_to(time);
        }
        EndCondition::NoEvents => while step_fn(sim) {},
        EndCondition::Steps(steps) => {
            for _ in 0..steps {
                if !step_fn(sim) {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Component, Key, Scheduler, SimError};

    struct TestComponent {
        counter: usize,
    }

    #[derive(Debug)]
    struct TestEvent;

    impl Component for TestComponent {
        type Event = TestEvent;

        fn process_event(&mut self, self_id: Key<Self::Event>, _event: &Self::Event, scheduler: &mut Scheduler) {
            self.counter += 1;
            if self.counter < 10 {
                scheduler.schedule(SimTime::from_secs(2), self_id, TestEvent);
            }
        }
    }

    fn ticking_simulation() -> (Simulation, Key<TestEvent>) {
        let mut sim = Simulation::default();
        let component = sim.add_component(TestComponent { counter: 0 });
        sim.schedule(SimTime::zero(), component, TestEvent);
        (sim, component)
    }

    #[test]
    fn test_create_executor() {
        assert_eq!(
            Executor::unbound(),
            Executor {
                end_condition: EndCondition::NoEvents
            }
        );
        assert_eq!(
            Executor::timed(SimTime::zero()),
            Executor {
                end_condition: EndCondition::Time(SimTime::zero())
            }
        );
        assert_eq!(
            Executor::steps(7),
            Executor {
                end_condition: EndCondition::Steps(7)
            }
        );
    }

    #[test]
    fn test_steps() {
        let (mut sim, component) = ticking_simulation();
        Executor::steps(10).execute(&mut sim);
        let c: TestComponent = sim.remove_component(component).unwrap();
        assert_eq!(c.counter, 10);
    }

    #[test]
    fn test_steps_stops_before() {
        let (mut sim, component) = ticking_simulation();
        // After 10 steps there are no events, so it will not execute all 100
        Executor::steps(100).execute(&mut sim);
        let c: TestComponent = sim.remove_component(component).unwrap();
        assert_eq!(c.counter, 10);
    }

    #[test]
    fn test_timed_includes_events_due_at_horizon() {
        let (mut sim, component) = ticking_simulation();
        Executor::timed(SimTime::from_secs(6)).execute(&mut sim);
        let c: TestComponent = sim.remove_component(component).unwrap();
        assert_eq!(c.counter, 4);
        assert_eq!(sim.scheduler.clock().time(), SimTime::from_secs(6));
    }

    #[test]
    fn test_timed_leaves_clock_at_horizon() {
        let (mut sim, component) = ticking_simulation();
        Executor::timed(SimTime::from_secs(5)).execute(&mut sim);
        let c: TestComponent = sim.remove_component(component).unwrap();
        assert_eq!(c.counter, 3);
        assert_eq!(sim.time(), SimTime::from_secs(5));
        // The tick due at 6 is still queued.
        assert_eq!(sim.scheduler.pending_events(), 1);
    }

    #[test]
    fn test_timed_on_empty_queue_advances_clock() {
        let mut sim = Simulation::default();
        Executor::timed(SimTime::from_secs(30)).execute(&mut sim);
        assert_eq!(sim.time(), SimTime::from_secs(30));
    }

    #[test]
    fn test_side_effect_sees_every_step() {
        let (mut sim, _) = ticking_simulation();
        let mut seen = Vec::new();
        Executor::unbound()
            .side_effect(|sim: &Simulation| seen.push(sim.time()))
            .execute(&mut sim);
        assert_eq!(seen.len(), 10);
        assert_eq!(seen.last(), Some(&SimTime::from_secs(18)));
    }

    #[test]
    fn test_events_for_removed_component_are_dropped() {
        let (mut sim, component) = ticking_simulation();
        Executor::steps(2).execute(&mut sim);
        let c: TestComponent = sim.remove_component(component).unwrap();
        assert_eq!(c.counter, 2);

        Executor::unbound().execute(&mut sim);
        assert!(!sim.has_pending_events());
        assert_eq!(sim.events_processed(), 3);
        assert_eq!(sim.time(), SimTime::from_secs(4));
    }

    #[test]
    fn test_take_component_reports_missing_and_mismatch() {
        struct Other;

        impl Component for Other {
            type Event = TestEvent;

            fn process_event(&mut self, _: Key<TestEvent>, _: &TestEvent, _: &mut Scheduler) {}
        }

        let (mut sim, component) = ticking_simulation();
        assert!(matches!(
            sim.take_component::<TestEvent, Other>(component),
            Err(SimError::TypeMismatch { .. })
        ));
        let c: TestComponent = sim.take_component(component).unwrap();
        assert_eq!(c.counter, 0);
        assert!(matches!(
            sim.take_component::<TestEvent, TestComponent>(component),
            Err(SimError::ComponentNotFound { .. })
        ));
    }
}
