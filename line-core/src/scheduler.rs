use std::any::Any;
use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::rc::Rc;
use tracing::trace;
use uuid::Uuid;

use crate::types::{EventClass, EventId};
use crate::{Key, SimTime};

/// Entry type stored in the scheduler, including the event value, component key, and the time when
/// it is supposed to occur.
///
/// Besides being stored in the scheduler's internal priority queue,
/// event entries are simply passed to [`crate::Components`] object, which unpacks them, and passes them
/// to the correct component.
#[derive(Debug)]
pub struct EventEntry {
    event_id: EventId,
    time: SimTime,
    class: EventClass,
    pub(crate) component: Uuid,
    inner: Box<dyn Any>,
}

impl EventEntry {
    pub(crate) fn new<E: fmt::Debug + 'static>(
        id: EventId,
        time: SimTime,
        class: EventClass,
        component: Key<E>,
        event: E,
    ) -> Self {
        EventEntry {
            event_id: id,
            time,
            class,
            component: component.id,
            inner: Box::new(event),
        }
    }

    /// Due time of the entry.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Sequence number assigned when the entry was scheduled.
    pub fn id(&self) -> EventId {
        self.event_id
    }

    pub fn class(&self) -> EventClass {
        self.class
    }

    /// Tries to downcast the event entry to one holding an event of type `E`.
    /// If fails, returns `None`.
    #[must_use]
    pub fn downcast<E: fmt::Debug + 'static>(&self) -> Option<EventEntryTyped<'_, E>> {
        self.inner.downcast_ref::<E>().map(|event| EventEntryTyped {
            id: self.event_id,
            time: self.time,
            component_key: Key::new_with_id(self.component),
            component_idx: self.component,
            event,
        })
    }

    fn ordering_key(&self) -> (SimTime, EventClass, EventId) {
        (self.time, self.class, self.event_id)
    }
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ordering_key() == other.ordering_key()
    }
}

impl Eq for EventEntry {}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and the earliest entry must surface first.
        other.ordering_key().cmp(&self.ordering_key())
    }
}

#[derive(Debug)]
pub struct EventEntryTyped<'e, E: fmt::Debug> {
    pub id: EventId,
    pub time: SimTime,
    pub component_key: Key<E>,
    pub component_idx: Uuid,
    pub event: &'e E,
}

type Clock = Rc<Cell<SimTime>>;

/// This struct exposes only immutable access to the simulation clock.
/// The clock itself is owned by the scheduler, while others can obtain `ClockRef`
/// to read the current simulation time.
///
/// # Example
///
/// ```
/// # use line_core::Scheduler;
/// let scheduler = Scheduler::default();
/// let clock_ref = scheduler.clock();
/// assert_eq!(clock_ref.time(), scheduler.time());
/// ```
#[derive(Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl From<Clock> for ClockRef {
    fn from(clock: Clock) -> Self {
        Self { clock }
    }
}

impl ClockRef {
    /// Return the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }
}

/// Scheduler is used to keep the current time and information about the upcoming events.
///
/// Entries are popped in `(due time, class, sequence)` order: earliest first,
/// interrupts before ordinary events due at the same instant, and otherwise in
/// the order they were scheduled.
pub struct Scheduler {
    next_event_id: u64,
    events: BinaryHeap<EventEntry>,
    clock: Clock,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            next_event_id: 0,
            events: BinaryHeap::default(),
            clock: Rc::new(Cell::new(SimTime::default())),
        }
    }
}

impl Scheduler {
    /// Schedules `event` to be executed for `component` at `self.time() + delay`.
    pub fn schedule<E: fmt::Debug + 'static>(&mut self, delay: SimTime, component: Key<E>, event: E) -> EventId {
        self.push_component_event(delay, EventClass::Normal, component, event)
    }

    /// Schedules `event` to be executed for `component` at `self.time()`.
    pub fn schedule_now<E: fmt::Debug + 'static>(&mut self, component: Key<E>, event: E) -> EventId {
        self.schedule(SimTime::zero(), component, event)
    }

    /// Schedules an interrupt for `component` at `self.time() + delay`.
    ///
    /// Interrupts run ahead of every ordinary event due at the same instant,
    /// including events scheduled earlier.
    pub fn schedule_interrupt<E: fmt::Debug + 'static>(
        &mut self,
        delay: SimTime,
        component: Key<E>,
        event: E,
    ) -> EventId {
        self.push_component_event(delay, EventClass::Interrupt, component, event)
    }

    fn push_component_event<E: fmt::Debug + 'static>(
        &mut self,
        delay: SimTime,
        class: EventClass,
        component: Key<E>,
        event: E,
    ) -> EventId {
        let id = self.next_event_id();
        let time = self.time() + delay;
        trace!(event_id = %id, ?class, %time, ?event, "Event scheduled");
        self.events.push(EventEntry::new(id, time, class, component, event));
        id
    }

    fn next_event_id(&mut self) -> EventId {
        self.next_event_id += 1;
        EventId(self.next_event_id)
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Returns a reference to the next scheduled event or `None` if none are left.
    pub fn peek(&self) -> Option<&EventEntry> {
        self.events.peek()
    }

    /// Removes and returns the next scheduled event or `None` if none are left.
    pub fn pop(&mut self) -> Option<EventEntry> {
        self.events.pop().inspect(|event| {
            self.clock.replace(event.time());
        })
    }

    /// Number of entries still queued.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Moves the clock forward to `time` without firing anything.
    ///
    /// The clock never moves backwards; an earlier `time` is ignored.
    pub fn advance_to(&mut self, time: SimTime) {
        if time > self.time() {
            self.clock.replace(time);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ids::deterministic_uuid;
    use std::time::Duration;

    fn component_entry(event_id: u64, secs: u64, class: EventClass) -> EventEntry {
        EventEntry {
            event_id: EventId(event_id),
            time: SimTime::from_secs(secs),
            class,
            component: deterministic_uuid(0, 0, event_id),
            inner: Box::new(String::from("inner")),
        }
    }

    #[test]
    fn test_clock_ref() {
        let time = SimTime::from_duration(Duration::from_secs(1));
        let clock = Clock::new(Cell::new(time));
        let clock_ref = ClockRef::from(clock);
        assert_eq!(clock_ref.time(), time);
    }

    #[test]
    fn test_event_entry_downcast() {
        let entry = component_entry(0, 1, EventClass::Normal);
        assert!(entry.downcast::<String>().is_some());
        assert!(entry.downcast::<i32>().is_none());
    }

    #[test]
    fn test_event_entry_cmp() {
        // Earlier due time first.
        assert_eq!(
            component_entry(5, 0, EventClass::Normal).cmp(&component_entry(1, 1, EventClass::Normal)),
            Ordering::Greater
        );
        // Same time: lower sequence first.
        assert_eq!(
            component_entry(1, 1, EventClass::Normal).cmp(&component_entry(2, 1, EventClass::Normal)),
            Ordering::Greater
        );
        // Same time: interrupts first, whatever their sequence.
        assert_eq!(
            component_entry(9, 1, EventClass::Interrupt).cmp(&component_entry(2, 1, EventClass::Normal)),
            Ordering::Greater
        );
    }

    #[derive(Debug, Clone, Eq, PartialEq)]
    struct EventA;
    #[derive(Debug, Clone, Eq, PartialEq)]
    struct EventB(u32);

    #[test]
    fn test_scheduler() {
        let mut scheduler = Scheduler::default();
        assert_eq!(scheduler.time(), SimTime::zero());
        assert_eq!(scheduler.clock().time(), SimTime::zero());
        assert_eq!(scheduler.pending_events(), 0);

        let component_a = Key::<EventA>::new_with_id(deterministic_uuid(1, 0, 1));
        let component_b = Key::<EventB>::new_with_id(deterministic_uuid(1, 0, 2));

        scheduler.schedule(SimTime::from_secs(1), component_a, EventA);
        scheduler.schedule_now(component_b, EventB(0));
        scheduler.schedule(SimTime::from_secs(2), component_b, EventB(1));

        let entry = scheduler.pop().unwrap();
        let entry = entry.downcast::<EventB>().unwrap();
        assert_eq!(entry.time, SimTime::zero());
        assert_eq!(entry.component_idx, component_b.id);
        assert_eq!(entry.event, &EventB(0));

        let entry = scheduler.pop().unwrap();
        let entry = entry.downcast::<EventA>().unwrap();
        assert_eq!(entry.time, SimTime::from_secs(1));
        assert_eq!(entry.component_key.id, component_a.id);
        assert_eq!(scheduler.clock().time(), SimTime::from_secs(1));

        let entry = scheduler.pop().unwrap();
        assert_eq!(entry.downcast::<EventB>().unwrap().event, &EventB(1));
        assert_eq!(scheduler.time(), SimTime::from_secs(2));

        assert!(scheduler.pop().is_none());
    }

    #[test]
    fn test_same_time_events_fire_in_scheduling_order() {
        let mut scheduler = Scheduler::default();
        let key = Key::<EventB>::new_with_id(deterministic_uuid(1, 0, 1));
        for n in 0..50 {
            scheduler.schedule(SimTime::from_secs(3), key, EventB(n));
        }
        let order: Vec<u32> = std::iter::from_fn(|| scheduler.pop())
            .map(|entry| entry.downcast::<EventB>().unwrap().event.0)
            .collect();
        assert_eq!(order, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_interrupt_wins_same_time_tie() {
        let mut scheduler = Scheduler::default();
        let key = Key::<EventB>::new_with_id(deterministic_uuid(1, 0, 1));
        scheduler.schedule(SimTime::from_secs(4), key, EventB(1));
        scheduler.schedule_interrupt(SimTime::from_secs(4), key, EventB(2));
        scheduler.schedule_interrupt(SimTime::from_secs(5), key, EventB(3));

        let first = scheduler.pop().unwrap();
        assert_eq!(first.class(), EventClass::Interrupt);
        assert_eq!(first.downcast::<EventB>().unwrap().event, &EventB(2));
        assert_eq!(scheduler.pop().unwrap().downcast::<EventB>().unwrap().event, &EventB(1));
        assert_eq!(scheduler.pop().unwrap().downcast::<EventB>().unwrap().event, &EventB(3));
    }

    #[test]
    fn test_advance_to_is_monotonic() {
        let mut scheduler = Scheduler::default();
        scheduler.advance_to(SimTime::from_secs(10));
        assert_eq!(scheduler.time(), SimTime::from_secs(10));
        scheduler.advance_to(SimTime::from_secs(3));
        assert_eq!(scheduler.time(), SimTime::from_secs(10));
    }
}
