//! The line: a named registry of buffers and stations
//!
//! Models are added one at a time and checked on the way in. Cross
//! references are only resolved when [`Line::simulate`] starts: every buffer
//! becomes a live [`BufferState`] in a `name -> handle` registry, every
//! station is built with the handles it names, and any wiring problem is
//! reported before the first event runs. A line simulates once.

use crate::buffer::{Buffer, BufferHandle, BufferState};
use crate::builder::{Validate, ValidationError};
use crate::error::LineError;
use crate::failure::{Failure, FailureController};
use crate::machine::{Machine, MachineStation};
use crate::report::{BufferReport, LineReport, MachineReport, Reportable, SourceReport, StationReport};
use crate::source::{Source, SourceStation};
use crate::station::StationEvent;
use line_core::ids::derive_seed;
use line_core::logging::events;
use line_core::{simulation_span, Distribution, Executor, Key, Sampler, SimTime, Simulation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, info};

const STREAM_PROCESSING: u64 = 0;
const DEFAULT_NAME: &str = "line";

/// Anything that can be added to a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    Buffer(Buffer),
    Source(Source),
    Machine(Machine),
}

impl Model {
    pub fn name(&self) -> &str {
        match self {
            Model::Buffer(buffer) => &buffer.name,
            Model::Source(source) => &source.name,
            Model::Machine(machine) => &machine.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Model::Buffer(_) => "buffer",
            Model::Source(_) => "source",
            Model::Machine(_) => "machine",
        }
    }

    fn check(&self) -> Result<(), LineError> {
        match self {
            Model::Buffer(buffer) => buffer.validate().map_err(|err| match err {
                ValidationError::ConstraintViolation { ref field, .. } if field == "capacity" => {
                    LineError::InvalidCapacity {
                        name: buffer.name.clone(),
                        capacity: buffer.capacity,
                    }
                }
                err => LineError::invalid_model(&buffer.name)(err),
            })?,
            Model::Source(source) => {
                source.validate().map_err(LineError::invalid_model(&source.name))?;
                source
                    .creation_time
                    .validate()
                    .map_err(LineError::distribution(&source.name))?;
                check_failure(source.failure.as_ref(), &source.name)?;
            }
            Model::Machine(machine) => {
                machine.validate().map_err(LineError::invalid_model(&machine.name))?;
                machine
                    .processing_time
                    .validate()
                    .map_err(LineError::distribution(&machine.name))?;
                check_failure(machine.failure.as_ref(), &machine.name)?;
            }
        }
        Ok(())
    }
}

fn check_failure(failure: Option<&Failure>, model: &str) -> Result<(), LineError> {
    match failure {
        Some(failure) => failure.validate().map_err(LineError::distribution(model)),
        None => Ok(()),
    }
}

impl From<Buffer> for Model {
    fn from(buffer: Buffer) -> Self {
        Model::Buffer(buffer)
    }
}

impl From<Source> for Model {
    fn from(source: Source) -> Self {
        Model::Source(source)
    }
}

impl From<Machine> for Model {
    fn from(machine: Machine) -> Self {
        Model::Machine(machine)
    }
}

/// Directed connection in the line's topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Serializable description of a whole line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub seed: u64,
    pub models: Vec<Model>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

#[derive(Deserialize)]
struct RawLineConfig {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default)]
    seed: u64,
    models: Vec<Value>,
}

impl LineConfig {
    /// Parse a JSON line description.
    ///
    /// A model whose `kind` is not `buffer`, `source` or `machine` is an
    /// [`LineError::InvalidModel`]; other malformed input is a [`LineError::Parse`].
    pub fn from_json(json: &str) -> Result<Self, LineError> {
        let raw: RawLineConfig = serde_json::from_str(json)?;
        let models = raw.models.into_iter().map(parse_model).collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: raw.name,
            seed: raw.seed,
            models,
        })
    }

    pub fn to_json(&self) -> Result<String, LineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the line, adding models in order.
    pub fn build(self) -> Result<Line, LineError> {
        let mut line = Line::with_seed(self.seed).named(self.name);
        for model in self.models {
            line.add_model(model)?;
        }
        Ok(line)
    }
}

fn parse_model(value: Value) -> Result<Model, LineError> {
    match value.get("kind").and_then(Value::as_str) {
        Some("buffer" | "source" | "machine") => Ok(serde_json::from_value(value)?),
        Some(other) => Err(LineError::InvalidModel(format!("unknown model kind '{other}'"))),
        None => Err(LineError::InvalidModel("model description has no 'kind'".to_string())),
    }
}

/// Station built during wiring, not yet registered.
enum Built {
    Source(SourceStation),
    Machine(MachineStation),
}

enum Registered {
    Source(Key<StationEvent>),
    Machine(Key<StationEvent>),
}

impl Registered {
    fn key(&self) -> Key<StationEvent> {
        match self {
            Registered::Source(key) | Registered::Machine(key) => *key,
        }
    }
}

struct Wiring {
    buffers: Vec<BufferHandle>,
    stations: Vec<Built>,
}

/// A production line.
///
/// ```rust
/// use line_components::{Buffer, Line, Machine, Source, Status};
/// use line_core::SimTime;
///
/// let mut line = Line::with_seed(7);
/// line.add_model(Buffer::new("raw", 5)).unwrap();
/// line.add_model(Buffer::new("done", 100)).unwrap();
/// line.add_model(Source::new("feeder", 2.0, "raw")).unwrap();
/// line.add_model(Machine::new("press", 3.0, "raw", "done")).unwrap();
///
/// let report = line.simulate(SimTime::from_secs(60)).unwrap();
/// let press = report.machine("press").unwrap();
/// assert!(press.items_processed > 0);
/// assert!(press.share_of(Status::Processing) > 0.9);
/// ```
#[derive(Debug)]
pub struct Line {
    name: String,
    seed: u64,
    models: Vec<Model>,
    report: Option<LineReport>,
}

impl Default for Line {
    fn default() -> Self {
        Self::new()
    }
}

impl Line {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Line whose random draws all derive from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            seed,
            models: Vec::new(),
            report: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn from_json(json: &str) -> Result<Self, LineError> {
        LineConfig::from_json(json)?.build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Models in the order they were added.
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|model| model.name() == name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn to_config(&self) -> LineConfig {
        LineConfig {
            name: self.name.clone(),
            seed: self.seed,
            models: self.models.clone(),
        }
    }

    /// Register a model. On error the line is left unchanged.
    pub fn add_model(&mut self, model: impl Into<Model>) -> Result<(), LineError> {
        if self.report.is_some() {
            return Err(LineError::AlreadySimulated);
        }
        let model = model.into();
        model.check()?;
        if self.model(model.name()).is_some() {
            return Err(LineError::DuplicateName(model.name().to_string()));
        }
        debug!(line = %self.name, kind = model.kind(), name = model.name(), "Model added");
        self.models.push(model);
        Ok(())
    }

    /// Edges from each source to its buffer, each buffer to the machine
    /// reading it, and each machine to its output buffer.
    pub fn topology(&self) -> Vec<Edge> {
        let edge = |from: &str, to: &str| Edge {
            from: from.to_string(),
            to: to.to_string(),
        };
        self.models
            .iter()
            .flat_map(|model| match model {
                Model::Buffer(_) => vec![],
                Model::Source(source) => vec![edge(&source.name, &source.output_buffer)],
                Model::Machine(machine) => vec![
                    edge(&machine.input_buffer, &machine.name),
                    edge(&machine.name, &machine.output_buffer),
                ],
            })
            .collect()
    }

    /// Run the line from time zero to `until` and keep the results.
    ///
    /// Wiring errors are returned before anything runs. A second call fails
    /// with [`LineError::AlreadySimulated`].
    pub fn simulate(&mut self, until: SimTime) -> Result<&LineReport, LineError> {
        if self.report.is_some() {
            return Err(LineError::AlreadySimulated);
        }
        let span = simulation_span(&self.name, until);
        let _guard = span.enter();

        let wiring = self.wire()?;
        let mut simulation = Simulation::default();
        let mut stations = Vec::with_capacity(wiring.stations.len());
        for built in wiring.stations {
            let registered = match built {
                Built::Source(source) => Registered::Source(simulation.add_component(source)),
                Built::Machine(machine) => Registered::Machine(simulation.add_component(machine)),
            };
            simulation.schedule(SimTime::zero(), registered.key(), StationEvent::Start);
            stations.push(registered);
        }

        events::simulation_started(&self.name, until, self.models.len());
        simulation.execute(Executor::timed(until));
        events::simulation_completed(&self.name, simulation.time(), simulation.events_processed());

        let mut reports = Vec::with_capacity(stations.len());
        for registered in stations {
            match registered {
                Registered::Source(key) => match simulation.take_component::<StationEvent, SourceStation>(key) {
                    Ok(mut source) => {
                        source.finalize(until);
                        reports.push(StationReport::Source(source.report()));
                    }
                    Err(err) => error!(%err, "Source lost during run"),
                },
                Registered::Machine(key) => match simulation.take_component::<StationEvent, MachineStation>(key) {
                    Ok(mut machine) => {
                        machine.finalize(until);
                        reports.push(StationReport::Machine(machine.report()));
                    }
                    Err(err) => error!(%err, "Machine lost during run"),
                },
            }
        }

        let report = LineReport {
            name: self.name.clone(),
            horizon: until,
            events_processed: simulation.events_processed(),
            stations: reports,
            buffers: wiring.buffers.iter().map(|buffer| buffer.borrow().report()).collect(),
        };
        info!(line = %self.name, stations = report.stations.len(), "Line report ready");
        Ok(&*self.report.insert(report))
    }

    /// Results of the run, once [`Line::simulate`] has completed.
    pub fn report(&self) -> Option<&LineReport> {
        self.report.as_ref()
    }

    pub fn machine_report(&self, name: &str) -> Option<&MachineReport> {
        self.report.as_ref()?.machine(name)
    }

    pub fn source_report(&self, name: &str) -> Option<&SourceReport> {
        self.report.as_ref()?.source(name)
    }

    pub fn buffer_report(&self, name: &str) -> Option<&BufferReport> {
        self.report.as_ref()?.buffer(name)
    }

    /// Resolve buffer names and build every station.
    fn wire(&self) -> Result<Wiring, LineError> {
        let mut registry: HashMap<&str, BufferHandle> = HashMap::new();
        let mut buffers = Vec::new();
        for model in &self.models {
            if let Model::Buffer(buffer) = model {
                let handle = BufferState::from_config(buffer).into_handle();
                registry.insert(buffer.name.as_str(), Rc::clone(&handle));
                buffers.push(handle);
            }
        }

        let mut producers: HashMap<&str, &str> = HashMap::new();
        let mut consumers: HashMap<&str, &str> = HashMap::new();
        let mut stations = Vec::new();
        for (index, model) in self.models.iter().enumerate() {
            let owner = index as u64;
            match model {
                Model::Buffer(_) => {}
                Model::Source(source) => {
                    let output = resolve(&registry, &source.name, &source.output_buffer)?;
                    claim(&mut producers, &source.output_buffer, &source.name, "producer")?;
                    let creation = self.sampler(&source.creation_time, owner, &source.name)?;
                    let failure = self.controller(source.failure.as_ref(), owner, &source.name)?;
                    stations.push(Built::Source(SourceStation::new(
                        source.name.clone(),
                        output,
                        creation,
                        failure,
                    )));
                }
                Model::Machine(machine) => {
                    let input = resolve(&registry, &machine.name, &machine.input_buffer)?;
                    claim(&mut consumers, &machine.input_buffer, &machine.name, "consumer")?;
                    let output = resolve(&registry, &machine.name, &machine.output_buffer)?;
                    claim(&mut producers, &machine.output_buffer, &machine.name, "producer")?;
                    let processing = self.sampler(&machine.processing_time, owner, &machine.name)?;
                    let failure = self.controller(machine.failure.as_ref(), owner, &machine.name)?;
                    stations.push(Built::Machine(MachineStation::new(
                        machine.name.clone(),
                        input,
                        output,
                        processing,
                        failure,
                    )));
                }
            }
        }
        debug!(buffers = buffers.len(), stations = stations.len(), "Line wired");
        Ok(Wiring { buffers, stations })
    }

    fn sampler(&self, distribution: &Distribution, owner: u64, model: &str) -> Result<Box<dyn Sampler>, LineError> {
        let sampler = distribution
            .sampler(derive_seed(self.seed, owner, STREAM_PROCESSING))
            .map_err(LineError::distribution(model))?;
        Ok(Box::new(sampler))
    }

    fn controller(
        &self,
        failure: Option<&Failure>,
        owner: u64,
        model: &str,
    ) -> Result<Option<FailureController>, LineError> {
        failure
            .map(|failure| failure.controller(self.seed, owner))
            .transpose()
            .map_err(LineError::distribution(model))
    }
}

fn resolve(registry: &HashMap<&str, BufferHandle>, station: &str, buffer: &str) -> Result<BufferHandle, LineError> {
    registry
        .get(buffer)
        .map(Rc::clone)
        .ok_or_else(|| LineError::UnresolvedBufferReference {
            station: station.to_string(),
            buffer: buffer.to_string(),
        })
}

fn claim<'a>(
    wired: &mut HashMap<&'a str, &'a str>,
    buffer: &'a str,
    station: &'a str,
    role: &'static str,
) -> Result<(), LineError> {
    match wired.entry(buffer) {
        Entry::Occupied(existing) => Err(LineError::BufferAlreadyWired {
            buffer: buffer.to_string(),
            role,
            existing: existing.get().to_string(),
            station: station.to_string(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(station);
            Ok(())
        }
    }
}
