//! Service configuration
//!
//! One JSON document drives the whole runtime. Every field has a default, so a
//! partial file only overrides what it names.

use crate::inference::ModelConfig;
use crate::ingest::IngestConfig;
use crate::sinks::SinkConfig;
use eeg_core::{config_error, EegError, EegResult};
use eeg_processing::{ProcessingConfig, WindowPipeline};
use eeg_simulation::{EegSimConfig, NoiseConfig, RhythmProfile, StreamConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Synthetic producer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub profile: RhythmProfile,
    pub noise: NoiseConfig,
    pub alpha_imbalance: f32,
    /// Emit chunks at wall-clock rate
    pub paced: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            profile: RhythmProfile::default(),
            noise: NoiseConfig::default(),
            alpha_imbalance: 0.0,
            paced: true,
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub sampling_rate: f32,
    pub channel_count: usize,
    pub window_seconds: f32,
    /// Cadence of the cycle role
    pub step_seconds: f32,
    /// Buffer length; twice the window when unset
    pub buffer_seconds: Option<f32>,
    pub processing: ProcessingConfig,
    /// Version tag stamped on every record
    pub model_version: String,
    pub model: ModelConfig,
    pub sinks: SinkConfig,
    pub ingest: IngestConfig,
    pub simulator: SimulatorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 256.0,
            channel_count: 8,
            window_seconds: 5.0,
            step_seconds: 1.0,
            buffer_seconds: None,
            processing: ProcessingConfig::default(),
            model_version: "va-regressor@1.3.0".to_string(),
            model: ModelConfig::default(),
            sinks: SinkConfig::default(),
            ingest: IngestConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Window length in time steps
    pub fn window_samples(&self) -> usize {
        seconds_to_samples(self.window_seconds, self.sampling_rate)
    }

    /// Buffer capacity in time steps
    pub fn buffer_samples(&self) -> usize {
        match self.buffer_seconds {
            Some(seconds) => seconds_to_samples(seconds, self.sampling_rate),
            None => 2 * self.window_samples(),
        }
    }

    pub fn step(&self) -> Duration {
        Duration::from_secs_f32(self.step_seconds.max(0.0))
    }

    /// Paced simulator stream for this configuration
    pub fn stream_config(&self, seed: Option<u64>) -> StreamConfig {
        StreamConfig {
            simulator: EegSimConfig {
                sampling_rate: self.sampling_rate,
                channel_count: self.channel_count,
                profile: self.simulator.profile.clone(),
                noise: self.simulator.noise.clone(),
                alpha_imbalance: self.simulator.alpha_imbalance,
                seed,
            },
            chunk_samples: self.ingest.chunk_samples,
            paced: self.simulator.paced,
        }
    }

    /// Check every setting before anything is started
    pub fn validate(&self) -> EegResult<()> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(config_error!("Sampling rate must be positive, got {}", self.sampling_rate));
        }
        if self.channel_count == 0 {
            return Err(config_error!("Channel count must be greater than 0"));
        }
        if !(self.step_seconds.is_finite() && self.step_seconds > 0.0) {
            return Err(config_error!("Step must be positive, got {} s", self.step_seconds));
        }
        if self.window_samples() == 0 {
            return Err(config_error!("Window must hold at least one sample"));
        }
        if self.model_version.trim().is_empty() {
            return Err(config_error!("Model version tag must not be empty"));
        }
        if self.ingest.chunk_samples == 0 {
            return Err(config_error!("Ingest chunk size must be greater than 0"));
        }

        let window = self.window_samples();
        let capacity = self.buffer_samples();
        if window > capacity {
            return Err(EegError::OutOfRange {
                requested: window,
                capacity,
            });
        }

        let asymmetry = &self.processing.features.asymmetry;
        let highest = asymmetry.left_channel.max(asymmetry.right_channel);
        if highest >= self.channel_count {
            return Err(config_error!(
                "Asymmetry channel {} does not exist with {} channels",
                highest,
                self.channel_count
            ));
        }

        let pipeline = WindowPipeline::from_config(&self.processing, self.sampling_rate)?;
        if window < pipeline.min_samples() {
            return Err(EegError::InsufficientSamples {
                required: pipeline.min_samples(),
                actual: window,
            });
        }

        self.model.build(self.processing.features.vector_len)?;
        self.sinks.validate()
    }

    /// Load from a JSON file
    pub fn load_json(path: &Path) -> EegResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| EegError::ConfigurationError {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> EegResult<Self> {
        serde_json::from_str(json).map_err(|e| EegError::ConfigurationError {
            message: format!("Failed to parse service config: {}", e),
        })
    }

    pub fn to_json(&self) -> EegResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EegError::ConfigurationError {
            message: format!("Failed to serialize service config: {}", e),
        })
    }
}

fn seconds_to_samples(seconds: f32, sampling_rate: f32) -> usize {
    (seconds * sampling_rate).round().max(0.0) as usize
}
