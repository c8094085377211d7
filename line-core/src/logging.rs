//! Structured logging for production-line simulations
//!
//! Logging goes through `tracing`; these helpers install a
//! `tracing-subscriber` fmt layer with an `EnvFilter`, so `RUST_LOG` always
//! wins over the level passed in.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example basic_line
//! RUST_LOG=line_components=trace cargo run --example basic_line
//! ```
//!
//! Level guidelines:
//! - **TRACE**: scheduler steps, buffer moves, stale wakeups
//! - **DEBUG**: station state transitions, failures and repairs
//! - **INFO**: run start and completion
//! - **WARN/ERROR**: conditions that indicate a wiring defect

use crate::SimTime;
use tracing::{debug, info, trace, Span};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging at INFO with the default module filters.
pub fn init_simulation_logging() {
    init_simulation_logging_with_level("info")
}

/// Initialize logging with a specific level
///
/// # Arguments
/// * `level` - Log level: "trace", "debug", "info", "warn", or "error"
///
/// Calling this more than once is harmless: the first subscriber stays installed.
///
/// ```rust
/// line_core::logging::init_simulation_logging_with_level("debug");
/// ```
pub fn init_simulation_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{level},line_core::scheduler=info,line_components={level},line_metrics={level}").into()
    });

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        info!("Simulation logging initialized at level: {}", level);
    }
}

/// Initialize TRACE logging with pretty-printed output, for debugging a single run.
pub fn init_detailed_simulation_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "debug,line_core=trace,line_components=trace,line_metrics=debug".into());

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        info!("Detailed simulation logging initialized");
    }
}

/// Create a span covering one `simulate` call.
pub fn simulation_span(name: &str, until: SimTime) -> Span {
    tracing::info_span!("simulation", name = name, until = %until)
}

/// Create a span covering the handling of one station event.
pub fn station_span(station: &str, time: SimTime) -> Span {
    tracing::debug_span!("station", name = station, time = %time)
}

/// Logging utilities for common simulation events
pub mod events {
    use super::*;

    pub fn simulation_started(name: &str, until: SimTime, entities: usize) {
        info!(simulation = name, until = %until, entities, "Simulation started");
    }

    pub fn simulation_completed(name: &str, final_time: SimTime, events_processed: u64) {
        info!(
            simulation = name,
            final_time = %final_time,
            events_processed,
            "Simulation completed"
        );
    }

    pub fn station_state_changed(station: &str, from: &str, to: &str, time: SimTime) {
        debug!(station, from, to, time = %time, "Station state changed");
    }

    pub fn interrupt_delivered(station: &str, interrupted: &str, time: SimTime) {
        debug!(station, interrupted, time = %time, "Failure interrupt delivered");
    }
}

/// Logging utilities for unusual but expected conditions
pub mod diagnostics {
    use super::*;

    /// A wakeup or timer arrived for a wait the station already left.
    pub fn stale_wakeup(station: &str, wait: u64, current: u64) {
        trace!(station, wait, current, "Ignoring stale wakeup");
    }
}
