//! Bounded FIFO token store connecting one producer to one consumer
//!
//! [`Buffer`] is the serializable description; [`BufferState`] is the live
//! store shared (through a [`BufferHandle`]) by the two stations wired to it
//! for the duration of one run.
//!
//! A `get` on an empty buffer or a `put` on a full one does not block the
//! caller here: the station registers a [`Waiter`] and suspends. When the
//! opposite operation frees an item or a slot, the longest-waiting waiter is
//! removed from its list and sent a [`StationEvent::Wake`] due immediately,
//! upon which it retries.

use crate::builder::{validate_non_empty, validate_positive, Validate, ValidationResult};
use crate::report::BufferReport;
use crate::station::{StationEvent, WaitId};
use line_core::{Key, Scheduler, SimTime};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::trace;

/// Description of a buffer in a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buffer {
    pub name: String,
    pub capacity: usize,
}

impl Buffer {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

impl Validate for Buffer {
    fn validate(&self) -> ValidationResult<()> {
        validate_non_empty("name", &self.name)?;
        validate_positive("capacity", self.capacity)
    }
}

/// A unit of work moving down the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token {
    /// Sequence number within the source that created it.
    pub id: u64,
    pub created_at: SimTime,
}

/// A station suspended on a buffer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiter {
    pub station: Key<StationEvent>,
    pub wait: WaitId,
}

pub type BufferHandle = Rc<RefCell<BufferState>>;

/// Live contents and wait-lists of one buffer.
#[derive(Debug)]
pub struct BufferState {
    name: String,
    capacity: usize,
    items: VecDeque<Token>,
    getters: VecDeque<Waiter>,
    putters: VecDeque<Waiter>,
    peak: usize,
    total_in: u64,
    total_out: u64,
    levels: Option<Vec<(SimTime, usize)>>,
}

impl BufferState {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            items: VecDeque::with_capacity(capacity),
            getters: VecDeque::new(),
            putters: VecDeque::new(),
            peak: 0,
            total_in: 0,
            total_out: 0,
            levels: None,
        }
    }

    pub fn from_config(config: &Buffer) -> Self {
        Self::new(config.name.clone(), config.capacity)
    }

    /// Keep a log of the occupancy after every change.
    ///
    /// Off by default: the log grows with every move for the whole run.
    pub fn with_level_log(mut self) -> Self {
        self.levels = Some(vec![(SimTime::zero(), self.items.len())]);
        self
    }

    pub fn into_handle(self) -> BufferHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Highest occupancy seen so far.
    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Occupancy after every change, starting with `(0, 0)`. Empty unless
    /// the log was enabled with [`BufferState::with_level_log`].
    pub fn levels(&self) -> &[(SimTime, usize)] {
        self.levels.as_deref().unwrap_or_default()
    }

    /// Tokens currently stored, oldest first.
    pub fn items(&self) -> impl Iterator<Item = &Token> {
        self.items.iter()
    }

    /// Take the oldest token if there is one, waking the longest-waiting putter.
    pub fn try_get(&mut self, scheduler: &mut Scheduler) -> Option<Token> {
        let token = self.items.pop_front()?;
        self.total_out += 1;
        self.level_changed(scheduler.time());
        if let Some(waiter) = self.putters.pop_front() {
            wake(waiter, scheduler);
        }
        Some(token)
    }

    /// Store `token` if there is room, waking the longest-waiting getter.
    ///
    /// A full buffer hands the token back untouched.
    pub fn try_put(&mut self, token: Token, scheduler: &mut Scheduler) -> Result<(), Token> {
        if self.is_full() {
            return Err(token);
        }
        self.items.push_back(token);
        self.total_in += 1;
        self.peak = self.peak.max(self.items.len());
        self.level_changed(scheduler.time());
        if let Some(waiter) = self.getters.pop_front() {
            wake(waiter, scheduler);
        }
        Ok(())
    }

    pub fn wait_get(&mut self, waiter: Waiter) {
        trace!(buffer = %self.name, wait = waiter.wait.0, "Station waiting for an item");
        self.getters.push_back(waiter);
    }

    pub fn wait_put(&mut self, waiter: Waiter) {
        trace!(buffer = %self.name, wait = waiter.wait.0, "Station waiting for a free slot");
        self.putters.push_back(waiter);
    }

    /// Drop `waiter` from both wait-lists. A waiter already woken is not listed.
    pub fn withdraw(&mut self, waiter: Waiter) {
        self.getters.retain(|w| *w != waiter);
        self.putters.retain(|w| *w != waiter);
    }

    /// Wake the next waiter on each side that could now proceed.
    ///
    /// Used when a wake-up reached a station that had already stopped waiting.
    pub fn relay(&mut self, scheduler: &mut Scheduler) {
        if !self.is_empty() {
            if let Some(waiter) = self.getters.pop_front() {
                wake(waiter, scheduler);
            }
        }
        if !self.is_full() {
            if let Some(waiter) = self.putters.pop_front() {
                wake(waiter, scheduler);
            }
        }
    }

    pub fn waiting_getters(&self) -> usize {
        self.getters.len()
    }

    pub fn waiting_putters(&self) -> usize {
        self.putters.len()
    }

    pub fn report(&self) -> BufferReport {
        BufferReport {
            name: self.name.clone(),
            capacity: self.capacity,
            content: self.items.len(),
            peak: self.peak,
            total_in: self.total_in,
            total_out: self.total_out,
        }
    }

    fn level_changed(&mut self, now: SimTime) {
        let level = self.items.len();
        trace!(buffer = %self.name, level, %now, "Buffer level changed");
        if let Some(levels) = self.levels.as_mut() {
            levels.push((now, level));
        }
        metrics::gauge!("linesim_buffer_level", "buffer" => self.name.clone()).set(level as f64);
    }
}

fn wake(waiter: Waiter, scheduler: &mut Scheduler) {
    scheduler.schedule_now(waiter.station, StationEvent::Wake { wait: waiter.wait });
}
