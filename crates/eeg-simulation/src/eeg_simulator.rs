//! Multi-channel EEG simulator built from band rhythms plus noise

use crate::signal_patterns::{RhythmComponent, RhythmProfile};
use eeg_core::{config_error, EegError, EegResult, SampleChunk};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Configuration for EEG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EegSimConfig {
    /// Sampling rate in Hz
    pub sampling_rate: f32,
    /// Number of channels to simulate
    pub channel_count: usize,
    /// Rhythm mixture to generate
    pub profile: RhythmProfile,
    /// Noise configuration
    pub noise: NoiseConfig,
    /// Relative alpha gain difference between channel 0 and channel 1,
    /// in `[-1, 1]`. Positive values strengthen the left channel.
    pub alpha_imbalance: f32,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

/// Noise configuration for realistic EEG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation (0.0 = no noise)
    pub gaussian_std: f32,
    /// Slow baseline drift amplitude
    pub baseline_wander: f32,
    /// Power line interference frequency (50/60 Hz)
    pub powerline_hz: Option<f32>,
    pub powerline_amplitude: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 2.0,
            baseline_wander: 5.0,
            powerline_hz: Some(50.0),
            powerline_amplitude: 1.0,
        }
    }
}

impl NoiseConfig {
    /// No noise at all, for deterministic tests
    pub fn silent() -> Self {
        Self {
            gaussian_std: 0.0,
            baseline_wander: 0.0,
            powerline_hz: None,
            powerline_amplitude: 0.0,
        }
    }
}

impl Default for EegSimConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 256.0,
            channel_count: 8,
            profile: RhythmProfile::Relaxed,
            noise: NoiseConfig::default(),
            alpha_imbalance: 0.0,
            seed: None,
        }
    }
}

impl EegSimConfig {
    pub fn validate(&self) -> EegResult<()> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(config_error!(
                "Simulator sampling rate must be positive, got {}",
                self.sampling_rate
            ));
        }
        if self.channel_count == 0 {
            return Err(config_error!("Simulator channel count must be greater than 0"));
        }
        if !(-1.0..=1.0).contains(&self.alpha_imbalance) {
            return Err(config_error!(
                "Alpha imbalance must lie in [-1, 1], got {}",
                self.alpha_imbalance
            ));
        }
        if !(self.noise.gaussian_std.is_finite() && self.noise.gaussian_std >= 0.0) {
            return Err(config_error!(
                "Noise standard deviation must be non-negative, got {}",
                self.noise.gaussian_std
            ));
        }
        Ok(())
    }
}

/// EEG signal simulator
pub struct EegSimulator {
    config: EegSimConfig,
    rng: StdRng,
    normal_dist: Normal<f32>,
    components: Vec<RhythmComponent>,
    /// Per-channel, per-component phase offsets
    phases: Vec<Vec<f64>>,
    /// Index of the next time step
    sample_index: u64,
}

impl EegSimulator {
    /// Create new EEG simulator with configuration
    pub fn new(config: EegSimConfig) -> EegResult<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let normal_dist = Normal::new(0.0, config.noise.gaussian_std).map_err(|e| {
            EegError::ConfigurationError {
                message: format!("Failed to create normal distribution: {}", e),
            }
        })?;

        let components = config.profile.components();
        let phases: Vec<Vec<f64>> = (0..config.channel_count)
            .map(|_| {
                components
                    .iter()
                    .map(|_| rng.gen_range(0.0..2.0 * PI))
                    .collect()
            })
            .collect();

        tracing::debug!(
            seed,
            channels = config.channel_count,
            profile = config.profile.description(),
            "EEG simulator created"
        );

        Ok(EegSimulator {
            config,
            rng,
            normal_dist,
            components,
            phases,
            sample_index: 0,
        })
    }

    /// Generate the next `samples` time steps
    pub fn generate_chunk(&mut self, samples: usize) -> EegResult<SampleChunk> {
        let channels = self.config.channel_count;
        let mut data = Vec::with_capacity(samples * channels);
        let dt = 1.0 / self.config.sampling_rate as f64;

        for step in 0..samples as u64 {
            let time = (self.sample_index + step) as f64 * dt;
            for channel in 0..channels {
                let value = self.rhythm_sample(time, channel) + self.noise_sample(time);
                data.push(value as f32);
            }
        }
        self.sample_index += samples as u64;

        SampleChunk::new(data, channels)
    }

    /// Generate signal for specified duration in seconds
    pub fn generate(&mut self, duration: f32) -> EegResult<SampleChunk> {
        let samples = (duration * self.config.sampling_rate).round().max(0.0) as usize;
        self.generate_chunk(samples)
    }

    fn rhythm_sample(&self, time: f64, channel: usize) -> f64 {
        let imbalance = self.config.alpha_imbalance as f64;
        let alpha_gain = match channel {
            0 => 1.0 + imbalance,
            1 => 1.0 - imbalance,
            _ => 1.0,
        };

        self.components
            .iter()
            .zip(&self.phases[channel])
            .map(|(component, &phase)| {
                let gain = if component.is_alpha() { alpha_gain } else { 1.0 };
                gain * component.value_at(time, phase)
            })
            .sum()
    }

    fn noise_sample(&mut self, time: f64) -> f64 {
        let noise = &self.config.noise;
        let mut value = self.normal_dist.sample(&mut self.rng) as f64;

        // Baseline wander (slow drift)
        value += noise.baseline_wander as f64 * (2.0 * PI * 0.1 * time).sin();

        if let Some(freq) = noise.powerline_hz {
            value += noise.powerline_amplitude as f64 * (2.0 * PI * freq as f64 * time).sin();
        }
        value
    }

    /// Seconds of signal generated so far
    pub fn elapsed_seconds(&self) -> f64 {
        self.sample_index as f64 / self.config.sampling_rate as f64
    }

    /// Get current configuration
    pub fn config(&self) -> &EegSimConfig {
        &self.config
    }
}
