//! Fixed-capacity multi-channel rolling buffer
//!
//! Decouples the producer (one writer, any cadence, any chunk size) from the
//! windowing consumer. A single mutex guards storage, cursor and counters, so
//! a reader never observes part of an append. Storage starts zeroed: a window
//! requested before `capacity` samples have arrived is zero-padded at its
//! oldest end.

use crate::error::{EegError, EegResult};
use crate::signal::{SampleChunk, Window};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe circular store of the most recent samples
#[derive(Debug)]
pub struct RollingBuffer {
    capacity: usize,
    channel_count: usize,
    state: Mutex<RingState>,
}

#[derive(Debug)]
struct RingState {
    /// Interleaved rows, `capacity * channel_count` values
    storage: Vec<f32>,
    /// Row index of the next write
    cursor: usize,
    /// Total time steps ever appended
    total_samples: u64,
}

impl RollingBuffer {
    /// Create an empty buffer holding `capacity` time steps
    pub fn new(capacity: usize, channel_count: usize) -> EegResult<Self> {
        if capacity == 0 {
            return Err(crate::config_error!("Buffer capacity must be greater than 0"));
        }
        if channel_count == 0 {
            return Err(crate::config_error!("Buffer channel count must be greater than 0"));
        }

        Ok(RollingBuffer {
            capacity,
            channel_count,
            state: Mutex::new(RingState {
                storage: vec![0.0; capacity * channel_count],
                cursor: 0,
                total_samples: 0,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Append a chunk of any length.
    ///
    /// A chunk at least as long as the buffer replaces the whole storage with
    /// its last `capacity` rows and resets the cursor to the start.
    pub fn append(&self, chunk: &SampleChunk) -> EegResult<()> {
        if chunk.channel_count() != self.channel_count {
            return Err(EegError::ChannelMismatch {
                expected: self.channel_count,
                actual: chunk.channel_count(),
            });
        }

        let n = chunk.samples();
        if n == 0 {
            return Ok(());
        }

        let width = self.channel_count;
        let mut state = self.lock();

        if n >= self.capacity {
            state.storage.copy_from_slice(chunk.tail(self.capacity));
            state.cursor = 0;
        } else {
            let data = chunk.as_slice();
            let start = state.cursor;
            let first = n.min(self.capacity - start);

            state.storage[start * width..(start + first) * width]
                .copy_from_slice(&data[..first * width]);
            if first < n {
                let rest = n - first;
                state.storage[..rest * width].copy_from_slice(&data[first * width..]);
            }
            state.cursor = (start + n) % self.capacity;
        }

        state.total_samples += n as u64;
        Ok(())
    }

    /// Copy of the most recent `length` time steps in chronological order
    pub fn window(&self, length: usize) -> EegResult<Window> {
        if length > self.capacity {
            return Err(EegError::OutOfRange {
                requested: length,
                capacity: self.capacity,
            });
        }

        let width = self.channel_count;
        let mut data = Vec::with_capacity(length * width);
        {
            let state = self.lock();
            let end = state.cursor;
            let start = (end + self.capacity - length) % self.capacity;

            if length > 0 && start < end {
                data.extend_from_slice(&state.storage[start * width..end * width]);
            } else if length > 0 {
                // wraps, or spans the whole ring when start == end
                data.extend_from_slice(&state.storage[start * width..]);
                data.extend_from_slice(&state.storage[..end * width]);
            }
        }

        Window::new(data, width)
    }

    /// Number of valid time steps currently held, `min(capacity, total)`
    pub fn len(&self) -> usize {
        let total = self.lock().total_samples;
        total.min(self.capacity as u64) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.lock().total_samples == 0
    }

    /// Whether at least `capacity` time steps have been appended
    pub fn is_filled(&self) -> bool {
        self.lock().total_samples >= self.capacity as u64
    }

    /// Total time steps appended since construction
    pub fn total_samples(&self) -> u64 {
        self.lock().total_samples
    }

    fn lock(&self) -> MutexGuard<'_, RingState> {
        // Appends never leave the state half-written before a panic can occur,
        // so a poisoned lock still guards consistent data.
        self.state.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!("Rolling buffer lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
