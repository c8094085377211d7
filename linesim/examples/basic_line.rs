//! A four-station line with a breakdown-prone bottleneck
//!
//! Run with:
//! ```bash
//! RUST_LOG=info cargo run --example basic_line
//! ```

use linesim::prelude::*;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    init_simulation_logging();

    let mut line = Line::with_seed(2024).named("assembly");
    line.add_model(Buffer::new("blanks", 10))?;
    line.add_model(Buffer::new("cut", 3))?;
    line.add_model(Buffer::new("welded", 3))?;
    line.add_model(Buffer::new("finished", 10_000))?;

    line.add_model(Source::new("feeder", Distribution::exponential(2.0, 0.5)?, "blanks"))?;
    line.add_model(Machine::new("cutter", Distribution::uniform(1.0, 2.0)?, "blanks", "cut"))?;
    line.add_model(
        Machine::new("welder", Distribution::triangular(1.0, 1.6, 2.5)?, "cut", "welded").with_failure(
            Failure::time_based(Distribution::exponential(60.0, 0.0)?, Distribution::uniform(3.0, 8.0)?)
                .with_policy(ResumePolicy::Reset),
        ),
    )?;
    line.add_model(
        Machine::new("painter", Distribution::normal(1.2, 0.2)?, "welded", "finished")
            .with_failure(Failure::count_based(Distribution::uniform(80.0, 120.0)?, 10.0)),
    )?;

    println!("Topology:");
    for edge in line.topology() {
        println!("  {edge}");
    }

    let report = line.simulate(SimTime::from_secs(8 * 3600))?;
    println!("\n{report}");

    for machine in report.machines() {
        println!(
            "{:<8} utilization {:>5.1}%  avg processing {:.3}",
            machine.name,
            machine.share_of(Status::Processing) * 100.0,
            machine.average_processing_time().as_secs_f64()
        );
    }

    let out = std::env::temp_dir().join("linesim-basic-line");
    std::fs::create_dir_all(&out)?;
    export_json(report, out.join("report.json"), true)?;
    export_csv(&report.state_rows(), out.join("states.csv"))?;
    println!("\nReports written to {}", out.display());
    Ok(())
}
