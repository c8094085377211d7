//! # linesim
//!
//! Deterministic discrete-event simulation of production and assembly lines.
//!
//! A line is a chain of sources and machines connected by bounded buffers.
//! Stations wait on empty inputs (starving), process items for drawn
//! durations, wait on full outputs (blocked) and can break down. A run
//! reports how much time every station spent in each of these states.
//!
//! ```rust
//! use linesim::prelude::*;
//!
//! let mut line = Line::with_seed(1);
//! line.add_model(Buffer::new("in", 4)).unwrap();
//! line.add_model(Buffer::new("out", 100)).unwrap();
//! line.add_model(Source::new("src", Distribution::exponential(2.0, 0.0).unwrap(), "in")).unwrap();
//! line.add_model(
//!     Machine::new("mill", 1.5, "in", "out").with_failure(Failure::time_based(30.0, 2.0)),
//! )
//! .unwrap();
//!
//! let report = line.simulate(SimTime::from_secs(100)).unwrap();
//! println!("{report}");
//! ```
//!
//! The workspace crates are re-exported as [`core`] (the kernel: time,
//! scheduler, distributions, logging), [`components`] (buffers, stations,
//! the line) and [`metrics`] (state tracking and exporters).

pub use line_components as components;
pub use line_core as core;
pub use line_metrics as metrics;

use line_components::{LineConfig, LineError, LineReport};
use line_core::SimTime;

/// Build a line from its JSON description and run it to `until`.
pub fn run_json(json: &str, until: SimTime) -> Result<LineReport, LineError> {
    let mut line = LineConfig::from_json(json)?.build()?;
    Ok(line.simulate(until)?.clone())
}

// Convenience re-exports of commonly used items
pub mod prelude {
    //! Commonly used types and traits

    pub use line_core::{
        init_simulation_logging, init_simulation_logging_with_level, Component, Distribution, Execute, Executor, Key,
        Sampler, SimTime, Simulation,
    };

    pub use line_components::{
        Buffer, Failure, FailureTrigger, Line, LineConfig, LineError, LineReport, Machine, MachineReport, Reportable,
        ResumePolicy, Source, SourceReport, Status,
    };

    pub use line_metrics::export::{export_csv, export_json};
    pub use line_metrics::{StatTracker, Stats};
}
