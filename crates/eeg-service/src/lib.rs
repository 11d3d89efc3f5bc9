//! EEG-Service: valence/arousal inference runtime
//!
//! An ingest thread fills the rolling buffer from a sample source while an
//! async cycle role windows it every step, extracts features, runs the model
//! and fans the record out to the registered sinks.

pub mod config;
pub mod inference;
pub mod ingest;
pub mod runtime;
pub mod service;
pub mod sinks;

pub use config::{ServiceConfig, SimulatorConfig};
pub use inference::{InferenceGateway, InferenceModel, LinearReadout, ModelConfig, StaticModel, Tensor};
pub use ingest::{spawn_ingest, IngestConfig, IngestHandle, IngestReport};
pub use runtime::ServiceRuntime;
pub use service::{CycleReport, CycleState, InferenceService, ServiceStats};
pub use sinks::{
    BroadcastSink, BusMessage, BusSink, FanOutReport, LatestResult, LatestResultSink, ResultSink, SinkConfig,
    SinkRegistry,
};
