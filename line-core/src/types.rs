//! Core type definitions and newtypes for the simulation kernel

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence number assigned to every scheduled event, in insertion order.
///
/// Two events due at the same instant (and of the same class) run in
/// ascending `EventId` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({})", self.0)
    }
}

/// Tie-break class of a scheduled event.
///
/// Events are ordered by due time first. At equal due times every
/// `Interrupt` event runs before any `Normal` event, regardless of when
/// either was scheduled; within a class the sequence number decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventClass {
    Interrupt,
    Normal,
}
