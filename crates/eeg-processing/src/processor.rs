//! Core window processor trait and stage timing

use eeg_core::{EegResult, Window};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Core trait for stateless window-to-window transforms
pub trait WindowProcessor: Send + Sync {
    /// Transform a window into a new window of the same shape
    fn process(&self, input: &Window) -> EegResult<Window>;

    /// Get processor name/identifier
    fn name(&self) -> &str;

    /// Shortest window (in time steps) this processor accepts
    fn min_samples(&self) -> usize {
        1
    }

    /// Get processor type for pipeline organization
    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Filter
    }
}

/// Types of window processors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorType {
    /// Frequency-selective filters
    Filter,
    /// Amplitude normalization
    Normalizer,
}

/// Timing record for one pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMetrics {
    /// Stage name
    pub stage: String,
    /// Actual processing time in microseconds
    pub processing_time_us: u64,
    /// Success/failure status
    pub success: bool,
    /// Error message if the stage failed
    pub error_message: Option<String>,
}

impl StageMetrics {
    /// Start timing a stage
    pub fn start_timing(stage: &str) -> ProcessingTimer {
        ProcessingTimer {
            start_time: Instant::now(),
            stage: stage.to_string(),
        }
    }
}

/// Helper for timing processing operations
pub struct ProcessingTimer {
    start_time: Instant,
    stage: String,
}

impl ProcessingTimer {
    /// Finish timing and return metrics
    pub fn finish(self) -> StageMetrics {
        StageMetrics {
            processing_time_us: self.start_time.elapsed().as_micros() as u64,
            stage: self.stage,
            success: true,
            error_message: None,
        }
    }

    /// Finish with error
    pub fn finish_with_error(self, error: &str) -> StageMetrics {
        StageMetrics {
            processing_time_us: self.start_time.elapsed().as_micros() as u64,
            stage: self.stage,
            success: false,
            error_message: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stage_timing() {
        let timer = StageMetrics::start_timing("filter");
        std::thread::sleep(Duration::from_millis(1));
        let metrics = timer.finish();

        assert_eq!(metrics.stage, "filter");
        assert!(metrics.processing_time_us > 0);
        assert!(metrics.success);
        assert!(metrics.error_message.is_none());
    }

    #[test]
    fn test_stage_timing_with_error() {
        let metrics = StageMetrics::start_timing("extract").finish_with_error("too short");
        assert!(!metrics.success);
        assert_eq!(metrics.error_message.as_deref(), Some("too short"));
    }
}
