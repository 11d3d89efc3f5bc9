//! EEG-Core: Foundation types for streaming EEG inference
//!
//! Sample containers, the shared rolling buffer, result records, the producer
//! boundary and the error type used across the workspace.

pub mod error;
pub mod record;
pub mod ring_buffer;
pub mod signal;
pub mod source;

pub use error::{EegError, EegResult};
pub use record::{Prediction, ResultRecord};
pub use ring_buffer::RollingBuffer;
pub use signal::{SampleChunk, Window};
pub use source::SampleSource;
