//! EEG-Simulation: Synthetic EEG generation
//!
//! Seeded multi-channel rhythm mixtures and a paced source for running the
//! inference service without acquisition hardware.

pub mod eeg_simulator;
pub mod real_time_stream;
pub mod signal_patterns;

pub use eeg_simulator::{EegSimConfig, EegSimulator, NoiseConfig};
pub use real_time_stream::{PacedEegSource, StreamConfig, StreamStats};
pub use signal_patterns::{RhythmComponent, RhythmProfile};
