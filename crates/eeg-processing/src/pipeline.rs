//! Window pipeline: preprocessing chain followed by feature extraction

use crate::config::{FeatureInput, ProcessingConfig};
use crate::features::{FeatureBundle, FeatureConfig, FeatureExtractor};
use crate::filters::FilterConfig;
use crate::normalize::Standardizer;
use crate::processor::{ProcessorType, StageMetrics, WindowProcessor};
use eeg_core::{EegResult, Window};
use std::time::Instant;

/// Processing pipeline that chains window processors and ends in the extractor
pub struct WindowPipeline {
    name: String,
    processors: Vec<Box<dyn WindowProcessor>>,
    extractor: FeatureExtractor,
    feature_input: FeatureInput,
}

/// Pipeline builder for constructing processing chains
pub struct PipelineBuilder {
    name: String,
    sampling_rate: f32,
    processors: Vec<Box<dyn WindowProcessor>>,
    feature_input: FeatureInput,
}

/// Pipeline execution result with per-stage timings
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub features: FeatureBundle,
    /// Output of the last preprocessing stage
    pub preprocessed: Window,
    /// Output of the last filter stage, kept only when features read from it
    pub filtered: Option<Window>,
    pub stage_metrics: Vec<StageMetrics>,
    pub total_latency_us: u64,
}

impl WindowPipeline {
    /// Build the band-pass, standardize, extract chain described by `config`
    pub fn from_config(config: &ProcessingConfig, sampling_rate: f32) -> EegResult<Self> {
        let extractor = FeatureExtractor::new(config.features.clone(), sampling_rate)?;
        let pipeline = PipelineBuilder::new(&config.name, sampling_rate)
            .add_bandpass(&config.bandpass)?
            .add_standardizer()
            .feature_input(config.feature_input)
            .build(extractor);

        tracing::info!(
            pipeline = %pipeline.name,
            sampling_rate,
            min_samples = pipeline.min_samples(),
            feature_input = ?pipeline.feature_input,
            "Window pipeline ready"
        );
        Ok(pipeline)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn feature_config(&self) -> &FeatureConfig {
        self.extractor.config()
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Shortest window every stage accepts
    pub fn min_samples(&self) -> usize {
        self.processors
            .iter()
            .map(|p| p.min_samples())
            .chain(std::iter::once(self.extractor.min_samples()))
            .max()
            .unwrap_or(1)
    }

    /// Run the preprocessing chain and extract features
    pub fn process(&self, window: &Window) -> EegResult<PipelineOutput> {
        let start = Instant::now();
        let mut stage_metrics = Vec::with_capacity(self.processors.len() + 1);
        let mut current = window.clone();
        let mut filtered: Option<Window> = None;
        let keep_filtered = self.feature_input == FeatureInput::Filtered;

        for processor in &self.processors {
            let timer = StageMetrics::start_timing(processor.name());
            match processor.process(&current) {
                Ok(output) => {
                    stage_metrics.push(timer.finish());
                    current = output;
                    if keep_filtered && processor.processor_type() == ProcessorType::Filter {
                        filtered = Some(current.clone());
                    }
                }
                Err(e) => {
                    let metrics = timer.finish_with_error(&e.to_string());
                    tracing::debug!(stage = %metrics.stage, error = %e, "Pipeline stage failed");
                    return Err(e);
                }
            }
        }

        let source = match self.feature_input {
            FeatureInput::Standardized => &current,
            FeatureInput::Filtered => filtered.as_ref().unwrap_or(&current),
        };

        let timer = StageMetrics::start_timing("Feature Extractor");
        let features = match self.extractor.extract(source) {
            Ok(features) => features,
            Err(e) => {
                let metrics = timer.finish_with_error(&e.to_string());
                tracing::debug!(stage = %metrics.stage, error = %e, "Pipeline stage failed");
                return Err(e);
            }
        };
        stage_metrics.push(timer.finish());

        Ok(PipelineOutput {
            features,
            preprocessed: current,
            filtered,
            stage_metrics,
            total_latency_us: start.elapsed().as_micros() as u64,
        })
    }
}

impl PipelineBuilder {
    pub fn new(name: &str, sampling_rate: f32) -> Self {
        PipelineBuilder {
            name: name.to_string(),
            sampling_rate,
            processors: Vec::new(),
            feature_input: FeatureInput::default(),
        }
    }

    /// Add processor to pipeline
    pub fn add_processor(mut self, processor: Box<dyn WindowProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn add_bandpass(self, config: &FilterConfig) -> EegResult<Self> {
        let filter = config.build(self.sampling_rate)?;
        Ok(self.add_processor(Box::new(filter)))
    }

    pub fn add_standardizer(self) -> Self {
        self.add_processor(Box::new(Standardizer::new()))
    }

    pub fn feature_input(mut self, input: FeatureInput) -> Self {
        self.feature_input = input;
        self
    }

    pub fn build(self, extractor: FeatureExtractor) -> WindowPipeline {
        WindowPipeline {
            name: self.name,
            processors: self.processors,
            extractor,
            feature_input: self.feature_input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::EegError;

    const FS: f32 = 256.0;

    fn mixed_window(samples: usize) -> Window {
        let channels: Vec<Vec<f32>> = (0..4)
            .map(|c| {
                (0..samples)
                    .map(|i| {
                        let t = i as f32 / FS;
                        let gain = 10.0 * (c + 1) as f32;
                        gain * (2.0 * std::f32::consts::PI * 10.0 * t).sin()
                            + 5.0 * (2.0 * std::f32::consts::PI * 22.0 * t).cos()
                            + 3.0
                    })
                    .collect()
            })
            .collect();
        Window::from_channels(&channels).unwrap()
    }

    #[test]
    fn test_default_pipeline_stages() {
        let pipeline = WindowPipeline::from_config(&ProcessingConfig::default(), FS).unwrap();
        assert_eq!(pipeline.processor_names(), vec!["Band-pass Filter", "Standardizer"]);
        let types: Vec<ProcessorType> = pipeline.processors.iter().map(|p| p.processor_type()).collect();
        assert_eq!(types, vec![ProcessorType::Filter, ProcessorType::Normalizer]);
        assert_eq!(pipeline.min_samples(), 128);

        let output = pipeline.process(&mixed_window(1280)).unwrap();
        assert_eq!(output.stage_metrics.len(), 3);
        assert!(output.stage_metrics.iter().all(|m| m.success));
        assert_eq!(output.features.image.shape(), [3, 224, 224]);
        assert_eq!(output.features.vector.len(), 26);
        assert_eq!(output.preprocessed.samples_per_channel(), 1280);
    }

    #[test]
    fn test_feature_input_selects_stage() {
        let window = mixed_window(1280);

        let mut config = ProcessingConfig::default();
        let standardized = WindowPipeline::from_config(&config, FS).unwrap().process(&window).unwrap();
        config.feature_input = FeatureInput::Filtered;
        let filtered = WindowPipeline::from_config(&config, FS).unwrap().process(&window).unwrap();

        // channel gains differ, so unstandardized band energies are larger
        assert_ne!(standardized.features.vector, filtered.features.vector);
        assert!(filtered.features.vector[2] > standardized.features.vector[2]);
        // standardization removes the gain difference between channels 0 and 1
        assert!(standardized.features.vector[5].abs() < filtered.features.vector[5].abs());
    }

    #[test]
    fn test_filtered_window_kept_only_when_read() {
        let window = mixed_window(1280);

        let mut config = ProcessingConfig::default();
        let standardized = WindowPipeline::from_config(&config, FS).unwrap().process(&window).unwrap();
        assert!(standardized.filtered.is_none());

        config.feature_input = FeatureInput::Filtered;
        let pipeline = WindowPipeline::from_config(&config, FS).unwrap();
        let output = pipeline.process(&window).unwrap();
        let band_passed = config.bandpass.build(FS).unwrap().filter(&window).unwrap();
        assert_eq!(output.filtered, Some(band_passed));
        assert_ne!(output.filtered.as_ref(), Some(&output.preprocessed));
    }

    #[test]
    fn test_short_window_propagates_error() {
        let pipeline = WindowPipeline::from_config(&ProcessingConfig::default(), FS).unwrap();
        let result = pipeline.process(&mixed_window(20));
        assert_eq!(
            result.unwrap_err(),
            EegError::InsufficientSamples { required: 28, actual: 20 }
        );
    }

    #[test]
    fn test_builder_without_preprocessing() {
        let extractor = FeatureExtractor::new(FeatureConfig::default(), FS).unwrap();
        let pipeline = PipelineBuilder::new("raw", FS)
            .feature_input(FeatureInput::Filtered)
            .build(extractor);

        let window = mixed_window(256);
        let output = pipeline.process(&window).unwrap();
        assert_eq!(output.preprocessed, window);
        assert_eq!(output.stage_metrics.len(), 1);
    }
}
