//! Real-time paced EEG source

use crate::eeg_simulator::{EegSimConfig, EegSimulator};
use eeg_core::{config_error, EegResult, SampleChunk, SampleSource};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Chunks the source may fall behind before it drops its backlog
const MAX_LAG_CHUNKS: u32 = 4;

/// Configuration for real-time streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// EEG simulation configuration
    pub simulator: EegSimConfig,
    /// Time steps per chunk (e.g. 32 for 125 ms chunks at 256 Hz)
    pub chunk_samples: usize,
    /// Emit chunks at the sampling rate instead of as fast as pulled
    pub paced: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            simulator: EegSimConfig::default(),
            chunk_samples: 32,
            paced: true,
        }
    }
}

/// Stream statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub chunks_generated: u64,
    pub samples_generated: u64,
    /// Times the source fell too far behind and resynchronised its clock
    pub resyncs: u64,
}

/// Simulated acquisition device emitting chunks at wall-clock rate
pub struct PacedEegSource {
    name: String,
    simulator: EegSimulator,
    chunk_samples: usize,
    chunk_period: Duration,
    paced: bool,
    next_deadline: Option<Instant>,
    stats: StreamStats,
}

impl PacedEegSource {
    /// Create new paced source
    pub fn new(config: StreamConfig) -> EegResult<Self> {
        if config.chunk_samples == 0 {
            return Err(config_error!("Stream chunk size must be greater than 0"));
        }
        let chunk_period =
            Duration::from_secs_f64(config.chunk_samples as f64 / config.simulator.sampling_rate as f64);
        let name = format!("simulator/{}", config.simulator.profile.description());
        let simulator = EegSimulator::new(config.simulator)?;

        tracing::info!(
            source = %name,
            chunk_samples = config.chunk_samples,
            chunk_ms = chunk_period.as_secs_f64() * 1000.0,
            paced = config.paced,
            "Simulated EEG source ready"
        );

        Ok(Self {
            name,
            simulator,
            chunk_samples: config.chunk_samples,
            chunk_period,
            paced: config.paced,
            next_deadline: None,
            stats: StreamStats::default(),
        })
    }

    pub fn chunk_period(&self) -> Duration {
        self.chunk_period
    }

    /// Get current stream statistics
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    fn wait_for_deadline(&mut self) {
        let now = Instant::now();
        let deadline = *self.next_deadline.get_or_insert(now);

        let emitted_at = if deadline > now {
            std::thread::sleep(deadline - now);
            deadline
        } else if now - deadline > self.chunk_period * MAX_LAG_CHUNKS {
            tracing::debug!(
                source = %self.name,
                lag_ms = (now - deadline).as_millis() as u64,
                "Source fell behind, resynchronising"
            );
            self.stats.resyncs += 1;
            now
        } else {
            deadline
        };

        self.next_deadline = Some(emitted_at + self.chunk_period);
    }
}

impl SampleSource for PacedEegSource {
    fn pull(&mut self) -> EegResult<SampleChunk> {
        if self.paced {
            self.wait_for_deadline();
        }

        let chunk = self.simulator.generate_chunk(self.chunk_samples)?;
        self.stats.chunks_generated += 1;
        self.stats.samples_generated += chunk.samples() as u64;
        Ok(chunk)
    }

    fn reconnect(&mut self) -> EegResult<()> {
        self.next_deadline = None;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn channel_count(&self) -> usize {
        self.simulator.config().channel_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_samples: usize, paced: bool) -> StreamConfig {
        let mut simulator = EegSimConfig::default();
        simulator.seed = Some(42);
        StreamConfig {
            simulator,
            chunk_samples,
            paced,
        }
    }

    #[test]
    fn test_unpaced_source_counts_chunks() {
        let mut source = PacedEegSource::new(config(64, false)).unwrap();
        for _ in 0..5 {
            let chunk = source.pull().unwrap();
            assert_eq!(chunk.samples(), 64);
            assert_eq!(chunk.channel_count(), source.channel_count());
        }
        assert_eq!(source.stats().chunks_generated, 5);
        assert_eq!(source.stats().samples_generated, 320);
        assert!(source.name().starts_with("simulator/"));
    }

    #[test]
    fn test_paced_source_follows_sampling_rate() {
        // 8 samples at 256 Hz is 31.25 ms per chunk
        let mut source = PacedEegSource::new(config(8, true)).unwrap();
        assert_eq!(source.chunk_period(), Duration::from_micros(31_250));

        let start = Instant::now();
        for _ in 0..4 {
            source.pull().unwrap();
        }
        // first chunk is immediate, three more periods follow
        assert!(start.elapsed() >= Duration::from_micros(3 * 31_250));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        assert!(PacedEegSource::new(config(0, true)).is_err());
    }
}
