//! Cycle role: cadence-driven windowing, extraction, inference and fan-out
//!
//! One cycle runs at a time so records leave in timestamp order. The buffer
//! lock is held only while the window is copied; the CPU-heavy stages run on
//! the blocking pool. Shutdown is observed between cycles, never inside one.

use crate::inference::InferenceGateway;
use crate::sinks::{FanOutReport, SinkRegistry};
use eeg_core::{config_error, EegError, EegResult, ResultRecord, RollingBuffer};
use eeg_processing::{StageMetrics, WindowPipeline};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep_until, Instant};

/// Observable phase of the cycle role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleState {
    Idle,
    Windowing,
    Extracting,
    Inferring,
    Publishing,
    Stopped,
}

/// Per-run statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceStats {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    /// Cadence ticks dropped because a cycle overran
    pub ticks_skipped: u64,
    /// Sink deliveries that failed or timed out
    pub sink_failures: u64,
    pub last_cycle_latency_us: u64,
    pub last_stage_metrics: Vec<StageMetrics>,
    pub last_record: Option<ResultRecord>,
}

/// Outcome of one successful cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub record: ResultRecord,
    pub fan_out: FanOutReport,
    pub stage_metrics: Vec<StageMetrics>,
    pub latency_us: u64,
}

/// Periodic window-to-record service
pub struct InferenceService {
    buffer: Arc<RollingBuffer>,
    pipeline: Arc<WindowPipeline>,
    gateway: Arc<InferenceGateway>,
    sinks: Arc<SinkRegistry>,
    window_samples: usize,
    step: Duration,
    state: watch::Sender<CycleState>,
    stats: Mutex<ServiceStats>,
}

impl InferenceService {
    pub fn new(
        buffer: Arc<RollingBuffer>,
        pipeline: Arc<WindowPipeline>,
        gateway: Arc<InferenceGateway>,
        sinks: Arc<SinkRegistry>,
        window_samples: usize,
        step: Duration,
    ) -> EegResult<Self> {
        if step.is_zero() {
            return Err(config_error!("Cycle step must be greater than 0"));
        }
        if window_samples > buffer.capacity() {
            return Err(EegError::OutOfRange {
                requested: window_samples,
                capacity: buffer.capacity(),
            });
        }
        if window_samples < pipeline.min_samples() {
            return Err(EegError::InsufficientSamples {
                required: pipeline.min_samples(),
                actual: window_samples,
            });
        }
        let needed = pipeline.extractor().min_channels();
        if buffer.channel_count() < needed {
            return Err(config_error!(
                "Pipeline needs {} channels, buffer holds {}",
                needed,
                buffer.channel_count()
            ));
        }

        let (state, _) = watch::channel(CycleState::Idle);
        Ok(Self {
            buffer,
            pipeline,
            gateway,
            sinks,
            window_samples,
            step,
            state,
            stats: Mutex::new(ServiceStats::default()),
        })
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> CycleState {
        *self.state.borrow()
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub async fn stats(&self) -> ServiceStats {
        self.stats.lock().await.clone()
    }

    fn set_state(&self, state: CycleState) {
        self.state.send_replace(state);
    }

    /// Run one complete cycle and record its outcome in the statistics
    pub async fn run_cycle(&self) -> EegResult<CycleReport> {
        let result = self.execute_cycle().await;
        self.set_state(CycleState::Idle);

        let mut stats = self.stats.lock().await;
        match &result {
            Ok(report) => {
                stats.cycles_completed += 1;
                stats.sink_failures += report.fan_out.failed.len() as u64;
                stats.last_cycle_latency_us = report.latency_us;
                stats.last_stage_metrics = report.stage_metrics.clone();
                stats.last_record = Some(report.record.clone());
            }
            Err(_) => stats.cycles_failed += 1,
        }
        result
    }

    async fn execute_cycle(&self) -> EegResult<CycleReport> {
        let start = Instant::now();
        let mut stage_metrics = Vec::new();

        self.set_state(CycleState::Windowing);
        let timer = StageMetrics::start_timing("Windowing");
        let window = self.buffer.window(self.window_samples)?;
        stage_metrics.push(timer.finish());

        self.set_state(CycleState::Extracting);
        let pipeline = Arc::clone(&self.pipeline);
        let output = tokio::task::spawn_blocking(move || pipeline.process(&window))
            .await
            .map_err(|e| blocking_failure("Feature extraction", e))??;
        stage_metrics.extend(output.stage_metrics);

        self.set_state(CycleState::Inferring);
        let timer = StageMetrics::start_timing("Inference");
        let gateway = Arc::clone(&self.gateway);
        let features = output.features;
        let prediction = tokio::task::spawn_blocking(move || gateway.predict(&features))
            .await
            .map_err(|e| blocking_failure("Inference", e))??;
        stage_metrics.push(timer.finish());

        self.set_state(CycleState::Publishing);
        let timer = StageMetrics::start_timing("Fan-out");
        let ts = chrono::Utc::now().timestamp_micros() as f64 / 1e6;
        let record = ResultRecord::new(ts, prediction, self.gateway.version());
        let fan_out = self.sinks.publish(&record).await?;
        stage_metrics.push(timer.finish());

        Ok(CycleReport {
            record,
            fan_out,
            stage_metrics,
            latency_us: start.elapsed().as_micros() as u64,
        })
    }

    /// Run cycles every step until `shutdown` turns true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> EegResult<ServiceStats> {
        let mut deadline = Instant::now() + self.step;

        tracing::info!(
            window_samples = self.window_samples,
            step_ms = self.step.as_millis() as u64,
            model = self.gateway.model_name(),
            version = self.gateway.version(),
            "Inference service started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = sleep_until(deadline) => {
                    match self.run_cycle().await {
                        Ok(report) => tracing::debug!(
                            ts = report.record.ts,
                            valence = report.record.valence,
                            arousal = report.record.arousal,
                            latency_us = report.latency_us,
                            delivered = report.fan_out.delivered.len(),
                            "Cycle complete"
                        ),
                        Err(e) => tracing::warn!(error = %e, "Cycle failed, no record published"),
                    }

                    let (next, skipped) = next_deadline(deadline, Instant::now(), self.step);
                    if skipped > 0 {
                        tracing::warn!(skipped, "Cycle overran its step, ticks skipped");
                        self.stats.lock().await.ticks_skipped += skipped;
                    }
                    deadline = next;
                }
            }
        }

        self.set_state(CycleState::Stopped);
        let stats = self.stats().await;
        tracing::info!(
            completed = stats.cycles_completed,
            failed = stats.cycles_failed,
            skipped = stats.ticks_skipped,
            "Inference service stopped"
        );
        Ok(stats)
    }
}

/// Next step boundary after `deadline` that is not yet in the past, and the
/// number of boundaries dropped on the way
fn next_deadline(deadline: Instant, now: Instant, step: Duration) -> (Instant, u64) {
    let following = deadline + step;
    if following >= now {
        return (following, 0);
    }
    let step_ns = step.as_nanos().max(1);
    let late_ns = now.duration_since(deadline).as_nanos();
    let periods = (late_ns + step_ns - 1) / step_ns;
    let next = deadline + Duration::from_nanos((periods * step_ns).min(u64::MAX as u128) as u64);
    (next, periods.saturating_sub(1) as u64)
}

fn blocking_failure(stage: &str, error: tokio::task::JoinError) -> EegError {
    EegError::ProcessingError {
        message: format!("{} task failed: {}", stage, error),
    }
}
