//! Sample chunks and analysis windows
//!
//! Both containers store time-major interleaved data: row `t` holds one value
//! per channel. Channel-major views are produced on demand for the per-channel
//! processing stages.

use crate::error::{EegError, EegResult};
use serde::{Deserialize, Serialize};

/// A batch of consecutive time steps delivered by the producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleChunk {
    data: Vec<f32>,
    channel_count: usize,
}

impl SampleChunk {
    /// Create a chunk from interleaved data
    pub fn new(data: Vec<f32>, channel_count: usize) -> EegResult<Self> {
        check_layout(data.len(), channel_count)?;
        Ok(SampleChunk { data, channel_count })
    }

    /// Create a chunk holding a single time step
    pub fn single(sample: Vec<f32>) -> EegResult<Self> {
        let channel_count = sample.len();
        Self::new(sample, channel_count)
    }

    /// Create a chunk from a list of rows, one per time step
    pub fn from_rows(rows: &[Vec<f32>], channel_count: usize) -> EegResult<Self> {
        let mut data = Vec::with_capacity(rows.len() * channel_count);
        for row in rows {
            if row.len() != channel_count {
                return Err(EegError::ChannelMismatch {
                    expected: channel_count,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(SampleChunk { data, channel_count })
    }

    /// Number of time steps in the chunk
    pub fn samples(&self) -> usize {
        self.data.len() / self.channel_count
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Interleaved samples
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Interleaved samples of the last `rows` time steps
    pub fn tail(&self, rows: usize) -> &[f32] {
        let rows = rows.min(self.samples());
        &self.data[self.data.len() - rows * self.channel_count..]
    }

    /// Iterate over time steps
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.channel_count)
    }
}

/// A fixed-length multi-channel analysis window
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    data: Vec<f32>,
    channel_count: usize,
}

impl Window {
    /// Create a window from interleaved data
    pub fn new(data: Vec<f32>, channel_count: usize) -> EegResult<Self> {
        check_layout(data.len(), channel_count)?;
        Ok(Window { data, channel_count })
    }

    /// All-zero window
    pub fn zeros(samples: usize, channel_count: usize) -> EegResult<Self> {
        Self::new(vec![0.0; samples * channel_count], channel_count)
    }

    /// Build a window from channel-major data (one vector per channel)
    pub fn from_channels(channels: &[Vec<f32>]) -> EegResult<Self> {
        let channel_count = channels.len();
        if channel_count == 0 {
            return Err(EegError::ChannelMismatch { expected: 1, actual: 0 });
        }

        let samples = channels[0].len();
        if let Some(bad) = channels.iter().find(|c| c.len() != samples) {
            return Err(EegError::ProcessingError {
                message: format!(
                    "Channel lengths differ: {} vs {} samples",
                    samples,
                    bad.len()
                ),
            });
        }

        let mut data = Vec::with_capacity(samples * channel_count);
        for t in 0..samples {
            for channel in channels {
                data.push(channel[t]);
            }
        }

        Ok(Window { data, channel_count })
    }

    /// Number of time steps
    pub fn samples_per_channel(&self) -> usize {
        self.data.len() / self.channel_count
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Total number of values across all channels
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Interleaved samples
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Values of all channels at time step `index`
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index * self.channel_count;
        self.data.get(start..start + self.channel_count)
    }

    /// Get data for a specific channel
    pub fn channel_data(&self, channel_index: usize) -> EegResult<Vec<f32>> {
        if channel_index >= self.channel_count {
            return Err(EegError::ChannelMismatch {
                expected: channel_index + 1,
                actual: self.channel_count,
            });
        }

        Ok(self
            .data
            .iter()
            .skip(channel_index)
            .step_by(self.channel_count)
            .copied()
            .collect())
    }

    /// Get all channel data as separate vectors
    pub fn all_channels(&self) -> Vec<Vec<f32>> {
        let samples = self.samples_per_channel();
        let mut channels = vec![Vec::with_capacity(samples); self.channel_count];
        for row in self.data.chunks_exact(self.channel_count) {
            for (channel, &value) in channels.iter_mut().zip(row) {
                channel.push(value);
            }
        }
        channels
    }

    /// Apply a per-channel transform and reassemble a window of the same shape
    pub fn map_channels<F>(&self, mut transform: F) -> EegResult<Window>
    where
        F: FnMut(&[f32]) -> EegResult<Vec<f32>>,
    {
        let samples = self.samples_per_channel();
        let mut output = Vec::with_capacity(self.channel_count);
        for channel in self.all_channels() {
            let processed = transform(&channel)?;
            if processed.len() != samples {
                return Err(EegError::ProcessingError {
                    message: format!(
                        "Channel transform changed length from {} to {}",
                        samples,
                        processed.len()
                    ),
                });
            }
            output.push(processed);
        }
        Window::from_channels(&output)
    }
}

fn check_layout(len: usize, channel_count: usize) -> EegResult<()> {
    if channel_count == 0 {
        return Err(EegError::ChannelMismatch { expected: 1, actual: 0 });
    }
    if len % channel_count != 0 {
        return Err(EegError::ProcessingError {
            message: format!(
                "Data length {} is not a multiple of {} channels",
                len, channel_count
            ),
        });
    }
    Ok(())
}
