//! Assembly of the running service from a validated configuration

use crate::config::ServiceConfig;
use crate::inference::InferenceGateway;
use crate::ingest::{spawn_ingest, IngestHandle};
use crate::service::InferenceService;
use crate::sinks::{BroadcastSink, BusMessage, BusSink, LatestResult, LatestResultSink, SinkRegistry};
use eeg_core::{EegResult, RollingBuffer, SampleSource};
use eeg_processing::WindowPipeline;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Every long-lived part of the service, shared by `Arc`
pub struct ServiceRuntime {
    config: ServiceConfig,
    buffer: Arc<RollingBuffer>,
    sinks: Arc<SinkRegistry>,
    broadcast: Arc<BroadcastSink>,
    latest: Arc<LatestResult>,
    service: Arc<InferenceService>,
    bus: Option<mpsc::Receiver<BusMessage>>,
}

impl ServiceRuntime {
    /// Validate `config` and build buffer, pipeline, model, sinks and service
    pub fn build(config: ServiceConfig) -> EegResult<Self> {
        config.validate()?;

        let buffer = Arc::new(RollingBuffer::new(config.buffer_samples(), config.channel_count)?);
        let pipeline = Arc::new(WindowPipeline::from_config(&config.processing, config.sampling_rate)?);

        let features = &config.processing.features;
        let model = config.model.build(features.vector_len)?;
        let gateway = Arc::new(InferenceGateway::new(model, features, &config.model_version)?);

        let sinks = Arc::new(SinkRegistry::new(config.sinks.timeout()));
        let broadcast = Arc::new(BroadcastSink::new("broadcast", config.sinks.broadcast_capacity));
        let (bus, bus_rx) = BusSink::new("bus", &config.sinks.bus_topic, config.sinks.bus_capacity);
        let latest = Arc::new(LatestResult::new());
        sinks.add(broadcast.clone())?;
        sinks.add(Arc::new(bus))?;
        sinks.add(Arc::new(LatestResultSink::new(latest.clone())))?;

        let service = Arc::new(InferenceService::new(
            buffer.clone(),
            pipeline,
            gateway,
            sinks.clone(),
            config.window_samples(),
            config.step(),
        )?);

        tracing::info!(
            sampling_rate = config.sampling_rate,
            channels = config.channel_count,
            window_samples = config.window_samples(),
            buffer_samples = config.buffer_samples(),
            sinks = ?sinks.names(),
            "Service runtime assembled"
        );

        Ok(Self {
            config,
            buffer,
            sinks,
            broadcast,
            latest,
            service,
            bus: Some(bus_rx),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn buffer(&self) -> &Arc<RollingBuffer> {
        &self.buffer
    }

    pub fn sinks(&self) -> &Arc<SinkRegistry> {
        &self.sinks
    }

    pub fn broadcast(&self) -> &Arc<BroadcastSink> {
        &self.broadcast
    }

    /// Last-known-value cell fed by the `latest` sink
    pub fn latest(&self) -> &Arc<LatestResult> {
        &self.latest
    }

    pub fn service(&self) -> &Arc<InferenceService> {
        &self.service
    }

    /// Receiving end of the bus sink; only the first call gets it
    pub fn take_bus_receiver(&mut self) -> Option<mpsc::Receiver<BusMessage>> {
        self.bus.take()
    }

    /// Start the ingest thread feeding this runtime's buffer
    pub fn start_ingest(
        &self,
        source: Box<dyn SampleSource>,
        shutdown: watch::Receiver<bool>,
    ) -> EegResult<IngestHandle> {
        spawn_ingest(source, self.buffer.clone(), self.config.ingest.clone(), shutdown)
    }
}
