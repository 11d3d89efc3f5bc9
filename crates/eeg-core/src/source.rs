//! Producer boundary

use crate::error::EegResult;
use crate::signal::SampleChunk;

/// Blocking source of sample chunks (acquisition hardware, network inlet,
/// simulator). Called from a dedicated ingest thread, one pull at a time.
pub trait SampleSource: Send {
    /// Block until the next chunk is available
    fn pull(&mut self) -> EegResult<SampleChunk>;

    /// Try to re-establish the upstream connection after a failed pull
    fn reconnect(&mut self) -> EegResult<()> {
        Ok(())
    }

    /// Source name for logs and errors
    fn name(&self) -> &str;

    /// Channel count of every chunk this source produces
    fn channel_count(&self) -> usize;
}
