//! Whole-run properties of lines with random timings
//!
//! These drive lines with seeded exponential, uniform and triangular draws
//! and check the accounting and conservation rules that must hold whatever
//! the draws are.

use line_components::{
    Buffer, BufferState, Line, LineConfig, LineError, Machine, MachineStation, Source, SourceStation, StationEvent,
    Status,
};
use line_core::{Distribution, Execute, Executor, Sampler, SimTime, Simulation};
use std::time::Duration;

fn exponential(mean: f64) -> Distribution {
    Distribution::exponential(mean, 0.0).unwrap()
}

fn sampler(distribution: Distribution, seed: u64) -> Box<dyn Sampler> {
    Box::new(distribution.sampler(seed).unwrap())
}

fn two_machine_line(seed: u64) -> Line {
    let mut line = Line::with_seed(seed).named("two-machines");
    line.add_model(Buffer::new("raw", 2)).unwrap();
    line.add_model(Buffer::new("mid", 1)).unwrap();
    line.add_model(Buffer::new("done", 1000)).unwrap();
    line.add_model(Source::new("feeder", exponential(1.0), "raw")).unwrap();
    line.add_model(Machine::new("cutter", Distribution::uniform(0.5, 2.0).unwrap(), "raw", "mid"))
        .unwrap();
    line.add_model(Machine::new("welder", Distribution::triangular(1.0, 1.5, 3.0).unwrap(), "mid", "done"))
        .unwrap();
    line
}

#[test]
fn test_states_cover_the_horizon_without_failures() {
    let horizon = SimTime::from_secs(500);
    let mut line = two_machine_line(11);
    let report = line.simulate(horizon).unwrap();

    for machine in report.machines() {
        let covered = machine.time_starved.total() + machine.time_processing.total() + machine.time_blocked.total();
        assert_eq!(covered, horizon.as_duration(), "{}", machine.name);
        assert!(machine.time_broken.is_empty());
        assert!(machine.items_processed > 0);
    }
    let feeder = report.source("feeder").unwrap();
    assert_eq!(
        feeder.time_processing.total() + feeder.time_blocked.total(),
        horizon.as_duration()
    );
    // raw (capacity 2) backs up behind the slower machines.
    assert!(feeder.time_blocked.total() > Duration::ZERO);
    assert!(report.machine("cutter").unwrap().time_blocked.total() > Duration::ZERO);
}

#[test]
fn test_same_seed_same_run() {
    let mut first = two_machine_line(3);
    let mut second = two_machine_line(3);
    let a = first.simulate(SimTime::from_secs(200)).unwrap().clone();
    let b = second.simulate(SimTime::from_secs(200)).unwrap().clone();
    assert_eq!(a, b);

    let mut other = two_machine_line(4);
    let c = other.simulate(SimTime::from_secs(200)).unwrap();
    assert_ne!(a.stations, c.stations);
}

#[test]
fn test_event_order_is_reproducible() {
    fn trace(seed: u64) -> Vec<(SimTime, u64)> {
        let mut sim = Simulation::default();
        let raw = BufferState::new("raw", 3).into_handle();
        let done = BufferState::new("done", 3).into_handle();
        let source = sim.add_component(SourceStation::new("s", raw.clone(), sampler(exponential(1.0), seed), None));
        let machine = sim.add_component(MachineStation::new("m", raw, done, sampler(exponential(1.2), seed + 1), None));
        sim.schedule(SimTime::zero(), source, StationEvent::Start);
        sim.schedule(SimTime::zero(), machine, StationEvent::Start);

        let mut seen = Vec::new();
        Executor::timed(SimTime::from_secs(100))
            .side_effect(|sim: &Simulation| seen.push((sim.time(), sim.events_processed())))
            .execute(&mut sim);
        seen
    }

    let first = trace(21);
    assert!(!first.is_empty());
    assert_eq!(first, trace(21));
}

#[test]
fn test_buffers_stay_within_capacity_and_tokens_are_conserved() {
    let mut sim = Simulation::default();
    let a = BufferState::new("a", 2).with_level_log().into_handle();
    let b = BufferState::new("b", 3).with_level_log().into_handle();
    let source = sim.add_component(SourceStation::new("s", a.clone(), sampler(exponential(1.0), 5), None));
    let machine = sim.add_component(MachineStation::new(
        "m",
        a.clone(),
        b.clone(),
        sampler(exponential(1.5), 6),
        None,
    ));
    sim.schedule(SimTime::zero(), source, StationEvent::Start);
    sim.schedule(SimTime::zero(), machine, StationEvent::Start);
    sim.execute(Executor::timed(SimTime::from_secs(300)));

    let source: SourceStation = sim.remove_component(source).unwrap();
    let machine: MachineStation = sim.remove_component(machine).unwrap();

    for buffer in [&a, &b] {
        let buffer = buffer.borrow();
        assert!(buffer.levels().len() > 1);
        assert!(buffer.levels().iter().all(|(_, level)| *level <= buffer.capacity()));
        assert!(buffer.peak() <= buffer.capacity());
        assert!(buffer.levels().windows(2).all(|w| w[0].0 <= w[1].0));
    }
    // b has no consumer, so the machine ends up blocked on it.
    assert_eq!(b.borrow().len(), 3);
    assert_eq!(machine.status(), Some(Status::Blocked));

    let created = source.items_created();
    let accounted = machine.items_processed()
        + a.borrow().len() as u64
        + u64::from(machine.holds_unprocessed())
        + u64::from(source.holds_undelivered());
    assert_eq!(created, accounted);
}

#[test]
fn test_conservation_in_a_line_report() {
    let mut line = Line::with_seed(99);
    line.add_model(Buffer::new("a", 4)).unwrap();
    line.add_model(Buffer::new("b", 1000)).unwrap();
    line.add_model(Source::new("s", exponential(1.0), "a")).unwrap();
    line.add_model(Machine::new("m", exponential(0.8), "a", "b")).unwrap();
    let report = line.simulate(SimTime::from_secs(250)).unwrap();

    let source = report.source("s").unwrap();
    let machine = report.machine("m").unwrap();
    let a = report.buffer("a").unwrap();
    let b = report.buffer("b").unwrap();
    assert_eq!(
        source.items_processed,
        machine.items_processed + a.content as u64 + u64::from(machine.holds_unprocessed) + u64::from(source.holds_undelivered)
    );
    assert_eq!(b.total_in, machine.items_processed - u64::from(machine.holds_processed));
    assert_eq!(a.total_in, a.total_out + a.content as u64);
}

#[test]
fn test_duplicate_name_leaves_line_unchanged() {
    let mut line = two_machine_line(1);
    let before = line.models().to_vec();

    let err = line.add_model(Buffer::new("cutter", 5)).unwrap_err();
    assert!(matches!(err, LineError::DuplicateName(ref name) if name == "cutter"));
    let err = line.add_model(Source::new("raw", 1.0, "done")).unwrap_err();
    assert!(matches!(err, LineError::DuplicateName(_)));
    assert_eq!(line.models(), before.as_slice());
}

#[test]
fn test_line_from_json() {
    let json = r#"{
        "name": "json-line",
        "seed": 42,
        "models": [
            {"kind": "buffer", "name": "in", "capacity": 5},
            {"kind": "buffer", "name": "out", "capacity": 50},
            {"kind": "source", "name": "src", "creation_time": {"type": "exponential", "mean": 2.0}, "output_buffer": "in"},
            {
                "kind": "machine",
                "name": "mill",
                "processing_time": {"type": "triangular", "min": 1.0, "mode": 1.5, "max": 2.5},
                "input_buffer": "in",
                "output_buffer": "out",
                "failure": {
                    "trigger": {"type": "time_based", "time_between_failures": {"type": "exponential", "mean": 20.0}},
                    "time_to_repair": {"type": "uniform", "min": 1.0, "max": 3.0},
                    "resume": "reset"
                }
            }
        ]
    }"#;
    let config = LineConfig::from_json(json).unwrap();
    assert_eq!(config.seed, 42);
    assert_eq!(config.models.len(), 4);

    let mut line = config.build().unwrap();
    assert_eq!(line.name(), "json-line");
    let topology: Vec<String> = line.topology().iter().map(ToString::to_string).collect();
    assert_eq!(topology, vec!["src -> in", "in -> mill", "mill -> out"]);

    let horizon = SimTime::from_secs(400);
    let report = line.simulate(horizon).unwrap();
    let mill = report.machine("mill").unwrap();
    assert!(mill.failures > 0);
    assert_eq!(mill.total_time(), horizon.as_duration());
    assert_eq!(mill.time_broken.len() as u64, mill.failures);
}

#[test]
fn test_bad_distribution_in_json_is_rejected() {
    let json = r#"{"models": [
        {"kind": "buffer", "name": "in", "capacity": 5},
        {"kind": "source", "name": "src", "creation_time": {"type": "gamma", "shape": 0.0, "scale": 1.0}, "output_buffer": "in"}
    ]}"#;
    let err = LineConfig::from_json(json).unwrap().build().unwrap_err();
    assert!(matches!(err, LineError::InvalidDistributionParameters { ref model, .. } if model == "src"));
}
