//! Result fan-out
//!
//! Every record is serialized once and handed to all registered sinks
//! concurrently. A sink that fails or exceeds the registry timeout is logged
//! and reported; the others are unaffected and there is no retry.

use async_trait::async_trait;
use eeg_core::{config_error, EegError, EegResult, ResultRecord};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Delivery channel for result records
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Unique name within a registry
    fn name(&self) -> &str;

    /// Deliver one record; `payload` is its JSON form
    async fn publish(&self, record: &ResultRecord, payload: &str) -> EegResult<()>;
}

/// Sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Per-sink delivery timeout
    pub timeout_ms: u64,
    /// Messages buffered per broadcast subscriber
    pub broadcast_capacity: usize,
    pub bus_topic: String,
    /// Messages buffered in the bus channel
    pub bus_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 500,
            broadcast_capacity: 16,
            bus_topic: "eeg/valence-arousal".to_string(),
            bus_capacity: 64,
        }
    }
}

impl SinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> EegResult<()> {
        if self.timeout_ms == 0 {
            return Err(config_error!("Sink timeout must be greater than 0 ms"));
        }
        if self.broadcast_capacity == 0 || self.bus_capacity == 0 {
            return Err(config_error!("Sink channel capacities must be greater than 0"));
        }
        if self.bus_topic.is_empty() {
            return Err(config_error!("Bus topic must not be empty"));
        }
        Ok(())
    }
}

/// Outcome of one fan-out, in registration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, EegError)>,
}

impl FanOutReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Set of sinks with explicit add/remove
pub struct SinkRegistry {
    sinks: RwLock<Vec<Arc<dyn ResultSink>>>,
    timeout: Duration,
}

impl SinkRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
            timeout,
        }
    }

    /// Register a sink; names must be unique
    pub fn add(&self, sink: Arc<dyn ResultSink>) -> EegResult<()> {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        if sinks.iter().any(|s| s.name() == sink.name()) {
            return Err(config_error!("Sink '{}' is already registered", sink.name()));
        }
        tracing::info!(sink = sink.name(), "Result sink registered");
        sinks.push(sink);
        Ok(())
    }

    /// Unregister a sink by name
    pub fn remove(&self, name: &str) -> bool {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        let before = sinks.len();
        sinks.retain(|s| s.name() != name);
        let removed = sinks.len() != before;
        if removed {
            tracing::info!(sink = name, "Result sink removed");
        }
        removed
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn ResultSink>> {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Deliver a record to every sink concurrently and wait for all of them
    pub async fn publish(&self, record: &ResultRecord) -> EegResult<FanOutReport> {
        let payload: Arc<str> = serde_json::to_string(record)
            .map_err(|e| EegError::ProcessingError {
                message: format!("Failed to serialize result record: {}", e),
            })?
            .into();
        let record = Arc::new(record.clone());

        let tasks: Vec<_> = self
            .snapshot()
            .into_iter()
            .map(|sink| {
                let name = sink.name().to_string();
                let record = Arc::clone(&record);
                let payload = Arc::clone(&payload);
                let timeout = self.timeout;
                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(timeout, sink.publish(&record, &payload)).await {
                        Ok(result) => result,
                        Err(_) => Err(EegError::SinkError {
                            sink: sink.name().to_string(),
                            message: format!("timed out after {} ms", timeout.as_millis()),
                        }),
                    }
                });
                (name, handle)
            })
            .collect();

        let mut report = FanOutReport::default();
        for (name, handle) in tasks {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(EegError::SinkError {
                    sink: name.clone(),
                    message: format!("task failed: {}", e),
                }),
            };
            match outcome {
                Ok(()) => report.delivered.push(name),
                Err(e) => {
                    tracing::warn!(sink = %name, error = %e, "Result sink failed");
                    report.failed.push((name, e));
                }
            }
        }
        Ok(report)
    }
}

/// Pub/sub sink; subscribers come and go at any time
pub struct BroadcastSink {
    name: String,
    sender: broadcast::Sender<Arc<str>>,
}

impl BroadcastSink {
    pub fn new(name: &str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            name: name.to_string(),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl ResultSink for BroadcastSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, _record: &ResultRecord, payload: &str) -> EegResult<()> {
        // no subscribers is not a failure
        if let Ok(receivers) = self.sender.send(Arc::from(payload)) {
            tracing::trace!(sink = %self.name, receivers, "Record broadcast");
        }
        Ok(())
    }
}

/// Topic-tagged message on the bus
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

/// Sink feeding a bounded channel drained by a broker client
pub struct BusSink {
    name: String,
    topic: String,
    sender: mpsc::Sender<BusMessage>,
}

impl BusSink {
    pub fn new(name: &str, topic: &str, capacity: usize) -> (Self, mpsc::Receiver<BusMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let sink = Self {
            name: name.to_string(),
            topic: topic.to_string(),
            sender,
        };
        (sink, receiver)
    }
}

#[async_trait]
impl ResultSink for BusSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, _record: &ResultRecord, payload: &str) -> EegResult<()> {
        let message = BusMessage {
            topic: self.topic.clone(),
            payload: payload.to_string(),
        };
        self.sender.send(message).await.map_err(|_| EegError::SinkError {
            sink: self.name.clone(),
            message: "bus channel closed".to_string(),
        })
    }
}

/// Most recent record, readable from any thread
#[derive(Debug, Default)]
pub struct LatestResult {
    record: RwLock<Option<ResultRecord>>,
}

impl LatestResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest record, or the zero record before the first cycle
    pub fn get(&self) -> ResultRecord {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }

    pub fn set(&self, record: ResultRecord) {
        *self.record.write().unwrap_or_else(PoisonError::into_inner) = Some(record);
    }
}

/// Sink keeping the [`LatestResult`] cell current
pub struct LatestResultSink {
    cell: Arc<LatestResult>,
}

impl LatestResultSink {
    pub fn new(cell: Arc<LatestResult>) -> Self {
        Self { cell }
    }
}

#[async_trait]
impl ResultSink for LatestResultSink {
    fn name(&self) -> &str {
        "latest"
    }

    async fn publish(&self, record: &ResultRecord, _payload: &str) -> EegResult<()> {
        self.cell.set(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::Prediction;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(ts: f64) -> ResultRecord {
        ResultRecord::new(ts, Prediction { valence: 0.5, arousal: -0.5 }, "va-regressor@1.3.0")
    }

    struct FailingSink;

    #[async_trait]
    impl ResultSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn publish(&self, _record: &ResultRecord, _payload: &str) -> EegResult<()> {
            Err(EegError::SinkError {
                sink: "failing".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    struct SlowSink;

    #[async_trait]
    impl ResultSink for SlowSink {
        fn name(&self) -> &str {
            "slow"
        }

        async fn publish(&self, _record: &ResultRecord, _payload: &str) -> EegResult<()> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }
    }

    struct CountingSink {
        name: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResultSink for CountingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn publish(&self, _record: &ResultRecord, _payload: &str) -> EegResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let registry = SinkRegistry::new(Duration::from_millis(200));
        let counting = Arc::new(CountingSink {
            name: "counting".to_string(),
            calls: AtomicUsize::new(0),
        });
        registry.add(Arc::new(FailingSink)).unwrap();
        registry.add(counting.clone()).unwrap();

        let report = registry.publish(&record(1.0)).await.unwrap();
        assert_eq!(report.delivered, vec!["counting".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "failing");
        assert!(!report.is_complete());
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_sink_times_out() {
        let registry = SinkRegistry::new(Duration::from_millis(50));
        let latest = Arc::new(LatestResult::new());
        registry.add(Arc::new(SlowSink)).unwrap();
        registry.add(Arc::new(LatestResultSink::new(latest.clone()))).unwrap();

        let started = std::time::Instant::now();
        let report = registry.publish(&record(2.0)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.delivered, vec!["latest".to_string()]);
        assert!(matches!(report.failed[0].1, EegError::SinkError { .. }));
        assert_eq!(latest.get().ts, 2.0);
    }

    #[tokio::test]
    async fn test_broadcast_delivers_identical_json() {
        let registry = SinkRegistry::new(Duration::from_millis(200));
        let broadcast = Arc::new(BroadcastSink::new("broadcast", 4));
        let mut first = broadcast.subscribe();
        let mut second = broadcast.subscribe();
        let (bus, mut bus_rx) = BusSink::new("bus", "eeg/va", 4);
        registry.add(broadcast.clone()).unwrap();
        registry.add(Arc::new(bus)).unwrap();

        let record = record(3.5);
        registry.publish(&record).await.unwrap();

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        let message = bus_rx.recv().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(&*a, message.payload.as_str());
        assert_eq!(message.topic, "eeg/va");

        let decoded: ResultRecord = serde_json::from_str(&a).unwrap();
        assert_eq!(decoded, record);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_succeeds() {
        let sink = BroadcastSink::new("broadcast", 4);
        assert_eq!(sink.subscriber_count(), 0);
        assert!(sink.publish(&record(1.0), "{}").await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_bus_fails() {
        let (bus, receiver) = BusSink::new("bus", "eeg/va", 1);
        drop(receiver);
        let result = bus.publish(&record(1.0), "{}").await;
        assert!(matches!(result, Err(EegError::SinkError { .. })));
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let registry = SinkRegistry::new(Duration::from_millis(100));
        registry.add(Arc::new(FailingSink)).unwrap();
        assert!(registry.add(Arc::new(FailingSink)).is_err());
        assert_eq!(registry.names(), vec!["failing".to_string()]);

        assert!(registry.remove("failing"));
        assert!(!registry.remove("failing"));
        assert!(registry.is_empty());

        let report = registry.publish(&record(1.0)).await.unwrap();
        assert!(report.delivered.is_empty() && report.is_complete());
    }

    #[test]
    fn test_latest_result_defaults_to_zero_record() {
        let latest = LatestResult::new();
        assert_eq!(latest.get(), ResultRecord::empty());

        latest.set(record(9.0));
        assert_eq!(latest.get().ts, 9.0);
        assert_eq!(latest.get().version, "va-regressor@1.3.0");
    }

    #[test]
    fn test_sink_config_validation() {
        assert!(SinkConfig::default().validate().is_ok());
        let config = SinkConfig {
            timeout_ms: 0,
            ..SinkConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
