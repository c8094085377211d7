//! Buffers, stations and the line registry for production-line simulations
//!
//! This crate builds on the kernel in `line_core`:
//!
//! - [`Buffer`], [`Source`] and [`Machine`] describe a line. They are plain
//!   serde types, so a whole line can be loaded from JSON through
//!   [`LineConfig`].
//! - [`Line`] registers them by name, resolves buffer references, runs the
//!   simulation to a horizon and keeps a [`LineReport`].
//! - [`SourceStation`] and [`MachineStation`] are the running components:
//!   explicit state machines over [`Status`] that move [`Token`]s through
//!   [`BufferState`]s and can be broken down by a [`FailureController`].
//!
//! Components can also be driven directly on a `line_core::Simulation`,
//! which is how the station tests script exact scenarios.

pub mod buffer;
pub mod builder;
pub mod error;
pub mod failure;
pub mod line;
pub mod machine;
pub mod report;
pub mod source;
pub mod station;
pub mod status;

pub use buffer::{Buffer, BufferHandle, BufferState, Token, Waiter};
pub use builder::{validate_non_empty, validate_positive, Validate, ValidationError, ValidationResult};
pub use error::LineError;
pub use failure::{Failure, FailureController, FailureTrigger, ResumePolicy};
pub use line::{Edge, Line, LineConfig, Model};
pub use machine::{Machine, MachineStation};
pub use report::{BufferReport, LineReport, MachineReport, Reportable, SourceReport, StationReport};
pub use source::{Source, SourceStation};
pub use station::{StationEvent, WaitId};
pub use status::Status;
