//! End-to-end runs through buffer, pipeline, model and sinks

use async_trait::async_trait;
use eeg_core::{EegError, EegResult, Prediction, ResultRecord, RollingBuffer, SampleChunk};
use eeg_processing::{Standardizer, WindowProcessor};
use eeg_service::{
    BroadcastSink, CycleState, LatestResult, LatestResultSink, ModelConfig, ResultSink, ServiceConfig,
    ServiceRuntime, SinkRegistry,
};
use eeg_simulation::PacedEegSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct RefusingSink;

#[async_trait]
impl ResultSink for RefusingSink {
    fn name(&self) -> &str {
        "refusing"
    }

    async fn publish(&self, _record: &ResultRecord, _payload: &str) -> EegResult<()> {
        Err(EegError::SinkError {
            sink: "refusing".to_string(),
            message: "broker unavailable".to_string(),
        })
    }
}

#[test]
fn test_constant_window_scenario() {
    let buffer = RollingBuffer::new(1280, 8).unwrap();
    let chunk = SampleChunk::new(vec![1.0; 1280 * 8], 8).unwrap();
    buffer.append(&chunk).unwrap();

    let window = buffer.window(1280).unwrap();
    assert_eq!(window.as_slice(), chunk.as_slice());

    let standardized = Standardizer::new().process(&window).unwrap();
    assert_eq!(standardized.samples_per_channel(), 1280);
    assert!(standardized.as_slice().iter().all(|&v| v == 0.0));
}

#[tokio::test]
async fn test_fan_out_isolation_with_three_sinks() {
    let registry = SinkRegistry::new(Duration::from_millis(200));
    let broadcast = Arc::new(BroadcastSink::new("broadcast", 4));
    let mut subscriber = broadcast.subscribe();
    let latest = Arc::new(LatestResult::new());

    registry.add(broadcast.clone()).unwrap();
    registry.add(Arc::new(RefusingSink)).unwrap();
    registry.add(Arc::new(LatestResultSink::new(latest.clone()))).unwrap();

    let record = ResultRecord::new(1.5, Prediction { valence: 0.2, arousal: 0.4 }, "va-regressor@1.3.0");
    let report = registry.publish(&record).await.unwrap();

    assert_eq!(report.delivered, vec!["broadcast".to_string(), "latest".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "refusing");
    assert_eq!(latest.get(), record);

    let payload = subscriber.recv().await.unwrap();
    let decoded: ResultRecord = serde_json::from_str(&payload).unwrap();
    assert_eq!(decoded, record);
}

#[tokio::test]
async fn test_runtime_streams_records() {
    let config = ServiceConfig {
        channel_count: 4,
        window_seconds: 2.0,
        step_seconds: 0.1,
        model: ModelConfig::Static {
            valence: 0.25,
            arousal: 0.75,
        },
        ..ServiceConfig::default()
    };
    let stream = config.stream_config(Some(5));

    let mut runtime = ServiceRuntime::build(config).unwrap();
    let mut bus = runtime.take_bus_receiver().unwrap();
    assert!(runtime.take_bus_receiver().is_none());
    assert_eq!(runtime.latest().get(), ResultRecord::empty());

    let (tx, rx) = watch::channel(false);
    let ingest = runtime
        .start_ingest(Box::new(PacedEegSource::new(stream).unwrap()), rx.clone())
        .unwrap();
    let service = runtime.service().clone();
    let cycle = tokio::spawn(async move { service.run(rx).await });

    tokio::time::sleep(Duration::from_millis(550)).await;
    tx.send_replace(true);

    let stats = cycle.await.unwrap().unwrap();
    let report = tokio::task::spawn_blocking(move || ingest.join()).await.unwrap().unwrap();

    assert!(stats.cycles_completed >= 1, "stats: {:?}", stats);
    assert_eq!(stats.cycles_failed, 0);
    assert_eq!(runtime.service().state(), CycleState::Stopped);
    assert!(report.error.is_none());
    assert!(report.samples > 0);
    assert_eq!(runtime.buffer().total_samples(), report.samples);

    let mut records = Vec::new();
    while let Ok(message) = bus.try_recv() {
        assert_eq!(message.topic, "eeg/valence-arousal");
        records.push(serde_json::from_str::<ResultRecord>(&message.payload).unwrap());
    }
    assert_eq!(records.len() as u64, stats.cycles_completed);
    assert!(records.windows(2).all(|pair| pair[0].ts <= pair[1].ts));
    assert!(records.iter().all(|r| r.valence == 0.25 && r.arousal == 0.75));
    assert!(records.iter().all(|r| r.version == "va-regressor@1.3.0"));

    let latest = runtime.latest().get();
    assert_eq!(Some(&latest), records.last());
}

#[test]
fn test_invalid_configuration_fails_before_start() {
    let config = ServiceConfig {
        buffer_seconds: Some(1.0),
        ..ServiceConfig::default()
    };
    let error = ServiceRuntime::build(config).err().unwrap();
    assert!(error.is_setup_error());
    assert!(matches!(error, EegError::OutOfRange { .. }));
}
