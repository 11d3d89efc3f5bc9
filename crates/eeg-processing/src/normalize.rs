//! Per-channel standardization

use crate::processor::{ProcessorType, WindowProcessor};
use eeg_core::{EegResult, Window};

/// Added to the standard deviation so constant channels map to zeros
pub const STD_EPSILON: f64 = 1e-6;

/// Rescales every channel of a window to zero mean and unit variance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standardizer {
    epsilon: f64,
}

impl Standardizer {
    pub fn new() -> Self {
        Self { epsilon: STD_EPSILON }
    }

    /// Standardize one channel using its population statistics
    pub fn standardize_channel(&self, samples: &[f32]) -> Vec<f32> {
        if samples.is_empty() {
            return Vec::new();
        }

        let n = samples.len() as f64;
        let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / n;
        let variance = samples
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let scale = variance.sqrt() + self.epsilon;

        samples
            .iter()
            .map(|&v| ((v as f64 - mean) / scale) as f32)
            .collect()
    }
}

impl Default for Standardizer {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowProcessor for Standardizer {
    fn process(&self, input: &Window) -> EegResult<Window> {
        input.map_channels(|channel| Ok(self.standardize_channel(channel)))
    }

    fn name(&self) -> &str {
        "Standardizer"
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Normalizer
    }
}
