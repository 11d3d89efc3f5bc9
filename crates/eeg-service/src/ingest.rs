//! Ingest role: source pulls feeding the rolling buffer
//!
//! Runs on its own OS thread because `SampleSource::pull` blocks. The loop
//! never waits on downstream work; the only shared state is the buffer.

use eeg_core::{EegError, EegResult, RollingBuffer, SampleSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;

/// Ingest settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Time steps per pulled chunk
    pub chunk_samples: usize,
    /// Reconnect attempts after a source error before the role gives up
    pub max_reconnect_attempts: u32,
    pub reconnect_backoff_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_samples: 32,
            max_reconnect_attempts: 5,
            reconnect_backoff_ms: 1000,
        }
    }
}

impl IngestConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

/// Summary returned when the ingest role ends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub chunks: u64,
    pub samples: u64,
    /// Chunks the buffer refused (channel mismatch)
    pub rejected_chunks: u64,
    pub reconnects: u32,
    /// Set when the role ended because the source could not be recovered
    pub error: Option<EegError>,
}

/// Handle to a running ingest thread
pub struct IngestHandle {
    source_name: String,
    thread: JoinHandle<IngestReport>,
}

impl IngestHandle {
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the thread to end
    pub fn join(self) -> EegResult<IngestReport> {
        self.thread.join().map_err(|_| EegError::ProcessingError {
            message: format!("Ingest thread for '{}' panicked", self.source_name),
        })
    }
}

/// Start pulling from `source` into `buffer` until shutdown or unrecoverable failure
pub fn spawn_ingest(
    mut source: Box<dyn SampleSource>,
    buffer: Arc<RollingBuffer>,
    config: IngestConfig,
    shutdown: watch::Receiver<bool>,
) -> EegResult<IngestHandle> {
    if source.channel_count() != buffer.channel_count() {
        return Err(EegError::ChannelMismatch {
            expected: buffer.channel_count(),
            actual: source.channel_count(),
        });
    }

    let source_name = source.name().to_string();
    let thread = thread::Builder::new()
        .name("eeg-ingest".to_string())
        .spawn(move || ingest_loop(source.as_mut(), &buffer, &config, &shutdown))
        .map_err(|e| EegError::ProcessingError {
            message: format!("Failed to spawn ingest thread: {}", e),
        })?;

    Ok(IngestHandle { source_name, thread })
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    // a dropped sender also means stop
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

fn ingest_loop(
    source: &mut dyn SampleSource,
    buffer: &RollingBuffer,
    config: &IngestConfig,
    shutdown: &watch::Receiver<bool>,
) -> IngestReport {
    let mut report = IngestReport::default();
    tracing::info!(source = source.name(), "Ingest started");

    while !stop_requested(shutdown) {
        match source.pull() {
            Ok(chunk) => {
                report.chunks += 1;
                match buffer.append(&chunk) {
                    Ok(()) => report.samples += chunk.samples() as u64,
                    Err(e) => {
                        report.rejected_chunks += 1;
                        tracing::warn!(source = source.name(), error = %e, "Chunk rejected");
                    }
                }
            }
            Err(e) => {
                tracing::error!(source = source.name(), error = %e, "Source failed");
                match recover(source, config, shutdown, &mut report, e) {
                    Ok(()) => continue,
                    Err(e) => {
                        tracing::error!(
                            source = source.name(),
                            attempts = config.max_reconnect_attempts,
                            error = %e,
                            "Source could not be recovered, ingest stopping"
                        );
                        report.error = Some(e);
                        break;
                    }
                }
            }
        }
    }

    tracing::info!(
        source = source.name(),
        chunks = report.chunks,
        samples = report.samples,
        reconnects = report.reconnects,
        "Ingest stopped"
    );
    report
}

/// Bounded reconnect with fixed backoff; `Ok` also covers shutdown during backoff
fn recover(
    source: &mut dyn SampleSource,
    config: &IngestConfig,
    shutdown: &watch::Receiver<bool>,
    report: &mut IngestReport,
    cause: EegError,
) -> EegResult<()> {
    let mut last_error = cause;

    for attempt in 1..=config.max_reconnect_attempts {
        thread::sleep(config.backoff());
        if stop_requested(shutdown) {
            return Ok(());
        }

        match source.reconnect() {
            Ok(()) => {
                report.reconnects += 1;
                tracing::info!(source = source.name(), attempt, "Source reconnected");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(source = source.name(), attempt, error = %e, "Reconnect failed");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::SampleChunk;
    use std::collections::VecDeque;

    enum Step {
        Chunk(usize),
        Fail,
    }

    /// Source replaying a fixed script, then requesting shutdown
    struct ScriptedSource {
        steps: VecDeque<Step>,
        reconnects: VecDeque<bool>,
        shutdown: Option<watch::Sender<bool>>,
        channels: usize,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>, reconnects: Vec<bool>, shutdown: Option<watch::Sender<bool>>) -> Self {
            Self {
                steps: steps.into(),
                reconnects: reconnects.into(),
                shutdown,
                channels: 2,
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn pull(&mut self) -> EegResult<SampleChunk> {
            match self.steps.pop_front() {
                Some(Step::Chunk(n)) => SampleChunk::new(vec![1.0; n * self.channels], self.channels),
                Some(Step::Fail) => Err(EegError::SourceError {
                    source_name: "scripted".to_string(),
                    message: "link lost".to_string(),
                }),
                None => {
                    if let Some(sender) = &self.shutdown {
                        sender.send_replace(true);
                    }
                    SampleChunk::new(Vec::new(), self.channels)
                }
            }
        }

        fn reconnect(&mut self) -> EegResult<()> {
            if self.reconnects.pop_front().unwrap_or(false) {
                Ok(())
            } else {
                Err(EegError::SourceError {
                    source_name: "scripted".to_string(),
                    message: "device not found".to_string(),
                })
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn channel_count(&self) -> usize {
            self.channels
        }
    }

    fn fast_config(attempts: u32) -> IngestConfig {
        IngestConfig {
            chunk_samples: 4,
            max_reconnect_attempts: attempts,
            reconnect_backoff_ms: 1,
        }
    }

    #[test]
    fn test_transient_failure_recovers() {
        let (tx, rx) = watch::channel(false);
        let source = ScriptedSource::new(
            vec![Step::Chunk(4), Step::Fail, Step::Chunk(4), Step::Chunk(4)],
            vec![false, true],
            Some(tx),
        );
        let buffer = Arc::new(RollingBuffer::new(64, 2).unwrap());

        let handle = spawn_ingest(Box::new(source), buffer.clone(), fast_config(3), rx).unwrap();
        assert_eq!(handle.source_name(), "scripted");
        let report = handle.join().unwrap();

        assert!(report.error.is_none());
        assert_eq!(report.reconnects, 1);
        assert_eq!(report.samples, 12);
        assert_eq!(buffer.total_samples(), 12);
    }

    #[test]
    fn test_exhausted_reconnects_end_with_report() {
        let (_tx, rx) = watch::channel(false);
        let source = ScriptedSource::new(vec![Step::Chunk(8), Step::Fail], vec![false, false], None);
        let buffer = Arc::new(RollingBuffer::new(64, 2).unwrap());

        let report = spawn_ingest(Box::new(source), buffer.clone(), fast_config(2), rx)
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(report.chunks, 1);
        assert_eq!(report.reconnects, 0);
        assert!(matches!(report.error, Some(EegError::SourceError { .. })));
        assert_eq!(buffer.total_samples(), 8);
    }

    #[test]
    fn test_shutdown_before_start() {
        let (tx, rx) = watch::channel(false);
        tx.send_replace(true);
        let source = ScriptedSource::new(vec![Step::Chunk(4)], Vec::new(), None);
        let buffer = Arc::new(RollingBuffer::new(16, 2).unwrap());

        let report = spawn_ingest(Box::new(source), buffer, fast_config(1), rx)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(report, IngestReport::default());
    }

    #[test]
    fn test_channel_mismatch_is_rejected_at_spawn() {
        let (_tx, rx) = watch::channel(false);
        let source = ScriptedSource::new(Vec::new(), Vec::new(), None);
        let buffer = Arc::new(RollingBuffer::new(16, 3).unwrap());
        let result = spawn_ingest(Box::new(source), buffer, fast_config(1), rx);
        assert!(matches!(result, Err(EegError::ChannelMismatch { expected: 3, actual: 2 })));
    }
}
