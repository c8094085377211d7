//! Discrete-event simulation kernel for production lines.
//!
//! This crate provides the virtual-time machinery the line simulator runs on:
//! a clock, a deterministic event queue, type-erased components that react
//! to their own events, and the distributions stations draw their
//! processing, creation and repair times from.
//!
//! # Architecture Overview
//!
//! - [`Simulation`] owns the [`Scheduler`] and the registered [`Components`].
//! - A [`Component`] handles events of its own type. It receives its own
//!   [`Key`] so it can schedule follow-up events for itself.
//! - [`Executor`] drives the simulation until a horizon, until the queue is
//!   empty, or for a number of steps.
//!
//! ```rust
//! use line_core::{Component, Execute, Executor, Key, Scheduler, SimTime, Simulation};
//!
//! #[derive(Debug)]
//! struct Tick;
//!
//! struct Counter(u32);
//!
//! impl Component for Counter {
//!     type Event = Tick;
//!
//!     fn process_event(&mut self, self_id: Key<Tick>, _event: &Tick, scheduler: &mut Scheduler) {
//!         self.0 += 1;
//!         scheduler.schedule(SimTime::from_secs(1), self_id, Tick);
//!     }
//! }
//!
//! let mut simulation = Simulation::default();
//! let counter = simulation.add_component(Counter(0));
//! simulation.schedule(SimTime::zero(), counter, Tick);
//! simulation.execute(Executor::timed(SimTime::from_secs(9)));
//!
//! let counter: Counter = simulation.remove_component(counter).unwrap();
//! assert_eq!(counter.0, 10);
//! assert_eq!(simulation.time(), SimTime::from_secs(9));
//! ```
//!
//! # Time Model
//!
//! All timing uses [`SimTime`], which represents simulation time (not wall-clock time).
//! Events due at the same instant run in the order they were scheduled, except that
//! interrupt-class events run first. Runs are therefore reproducible.

pub mod dists;
pub mod error;
pub mod execute;
pub mod ids;
pub mod logging;
pub mod scheduler;
pub mod time;
pub mod types;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, instrument, trace, warn};
use uuid::Uuid;

pub use dists::{DistSampler, Distribution, Sampler};
pub use error::{DistributionError, SimError};
pub use execute::{Execute, Executor};
pub use logging::{
    init_detailed_simulation_logging, init_simulation_logging, init_simulation_logging_with_level, simulation_span,
    station_span,
};
pub use scheduler::{ClockRef, EventEntry, Scheduler};
pub use time::SimTime;
pub use types::{EventClass, EventId};

/// Typed address of a registered component.
pub struct Key<T> {
    id: Uuid,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Key<T> {
    pub fn new_with_id(id: Uuid) -> Self {
        Self {
            id,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the UUID of this key
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.id).finish()
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Key<T> {}

pub trait ProcessEventEntry: Any {
    fn process_event_entry(&mut self, entry: EventEntry, scheduler: &mut Scheduler);
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// An entity driven by its own events.
pub trait Component: ProcessEventEntry {
    type Event: 'static;

    fn process_event(&mut self, self_id: Key<Self::Event>, event: &Self::Event, scheduler: &mut Scheduler);
}

impl<E, C> ProcessEventEntry for C
where
    E: fmt::Debug + 'static,
    C: Component<Event = E> + 'static,
{
    fn process_event_entry(&mut self, entry: EventEntry, scheduler: &mut Scheduler) {
        match entry.downcast::<E>() {
            Some(typed) => self.process_event(typed.component_key, typed.event, scheduler),
            None => error!(
                expected = std::any::type_name::<E>(),
                event_id = %entry.id(),
                "Event type does not match the component it was addressed to"
            ),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Container holding type-erased components.
#[derive(Default)]
pub struct Components {
    next_component: u64,
    components: HashMap<Uuid, Box<dyn ProcessEventEntry>>,
}

impl Components {
    /// Process the event on the component given by the event entry.
    ///
    /// Events addressed to a removed component are dropped.
    pub fn process_event_entry(&mut self, entry: EventEntry, scheduler: &mut Scheduler) {
        let idx = entry.component;
        match self.components.get_mut(&idx) {
            Some(component) => component.process_event_entry(entry, scheduler),
            None => trace!(component = %idx, "Dropping event for removed component"),
        }
    }

    /// Registers a new component and returns its key.
    ///
    /// Keys are allocated from a counter, so identical registration
    /// sequences produce identical keys.
    #[must_use]
    pub fn register<E: fmt::Debug + 'static, C: Component<Event = E> + 'static>(&mut self, component: C) -> Key<E> {
        self.next_component += 1;
        let id = ids::deterministic_uuid(0, ids::UUID_DOMAIN_COMPONENT, self.next_component);
        self.components.insert(id, Box::new(component));
        Key::new_with_id(id)
    }

    pub fn remove<E: 'static, C: Component<Event = E> + 'static>(&mut self, key: Key<E>) -> Option<C> {
        self.components.remove(&key.id).and_then(|boxed_trait| {
            let boxed_any: Box<dyn Any> = boxed_trait;
            boxed_any.downcast::<C>().ok().map(|boxed_c| *boxed_c)
        })
    }

    /// Remove a component, reporting why it could not be handed back.
    ///
    /// A component of another type stays registered.
    pub fn take<E: 'static, C: Component<Event = E> + 'static>(&mut self, key: Key<E>) -> Result<C, SimError> {
        let not_found = || SimError::ComponentNotFound { id: key.id.to_string() };
        let component = self.components.get_mut(&key.id).ok_or_else(not_found)?;
        if !component.as_any_mut().is::<C>() {
            return Err(SimError::TypeMismatch {
                expected: std::any::type_name::<C>().to_string(),
            });
        }
        self.remove(key).ok_or_else(not_found)
    }

    /// Get mutable access to a component
    pub fn get_component_mut<E: 'static, C: Component<Event = E> + 'static>(&mut self, key: Key<E>) -> Option<&mut C> {
        self.components
            .get_mut(&key.id)
            .and_then(|boxed_trait| boxed_trait.as_any_mut().downcast_mut::<C>())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Simulation struct that puts different parts of the simulation together.
///
/// See the [crate-level documentation](index.html) for more information.
#[derive(Default)]
pub struct Simulation {
    /// Event scheduler.
    pub scheduler: Scheduler,
    /// Component container.
    pub components: Components,
    events_processed: u64,
}

impl Simulation {
    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.scheduler.time()
    }

    /// Number of entries popped and dispatched so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Performs one step of the simulation. Returns `true` if there was in fact an event
    /// available to process, and `false` otherwise, which signifies that the simulation
    /// ended.
    pub fn step(&mut self) -> bool {
        self.scheduler.pop().is_some_and(|event| {
            trace!(
                time = %event.time(),
                event_id = %event.id(),
                class = ?event.class(),
                "Processing simulation step"
            );
            self.events_processed += 1;
            self.components.process_event_entry(event, &mut self.scheduler);
            true
        })
    }

    /// Runs the entire simulation.
    ///
    /// The stopping condition and other execution details depend on the executor used.
    /// See [`Execute`] and [`Executor`] for more details.
    #[instrument(skip(self, executor), fields(initial_time = %self.time()))]
    pub fn execute<E: Execute>(&mut self, executor: E) {
        debug!("Starting simulation execution");
        executor.execute(self);
        debug!(final_time = %self.time(), events = self.events_processed, "Simulation execution completed");
    }

    /// Adds a new component.
    #[must_use]
    pub fn add_component<E: fmt::Debug + 'static, C: Component<Event = E> + 'static>(&mut self, component: C) -> Key<E> {
        let key = self.components.register(component);
        debug!(
            component_id = %key.id(),
            component_type = std::any::type_name::<C>(),
            "Added component to simulation"
        );
        key
    }

    /// Remove a component: usually at the end of the simulation to peek at the state
    #[must_use]
    pub fn remove_component<E: fmt::Debug + 'static, C: Component<Event = E> + 'static>(
        &mut self,
        key: Key<E>,
    ) -> Option<C> {
        let result = self.components.remove(key);
        if result.is_none() {
            warn!(component_id = %key.id(), "Attempted to remove non-existent component");
        }
        result
    }

    /// Remove a component at the end of the run, failing if it is missing or of another type.
    pub fn take_component<E: fmt::Debug + 'static, C: Component<Event = E> + 'static>(
        &mut self,
        key: Key<E>,
    ) -> Result<C, SimError> {
        self.components.take(key)
    }

    /// Get mutable access to a component
    pub fn get_component_mut<E: fmt::Debug + 'static, C: Component<Event = E> + 'static>(
        &mut self,
        key: Key<E>,
    ) -> Option<&mut C> {
        self.components.get_component_mut(key)
    }

    /// Schedules a new event for `component`, `delay` after the current time.
    pub fn schedule<E: fmt::Debug + 'static>(&mut self, delay: SimTime, component: Key<E>, event: E) -> EventId {
        self.scheduler.schedule(delay, component, event)
    }

    /// Returns the time of the next scheduled event, or None if no events are scheduled.
    pub fn peek_next_event_time(&self) -> Option<SimTime> {
        self.scheduler.peek().map(|e| e.time())
    }

    /// Returns a ClockRef for reading the simulation time.
    pub fn clock(&self) -> ClockRef {
        self.scheduler.clock()
    }

    /// Check if there are pending events
    pub fn has_pending_events(&self) -> bool {
        self.scheduler.peek().is_some()
    }
}
