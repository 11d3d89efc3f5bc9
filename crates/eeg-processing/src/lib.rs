//! EEG-Processing: Window preprocessing and feature extraction
//!
//! Zero-phase band-pass filtering, per-channel standardization, and the
//! spectrogram image plus band-entropy vector consumed by the model.

pub mod config;
pub mod features;
pub mod filters;
pub mod normalize;
pub mod pipeline;
pub mod processor;
pub mod spectrogram;

pub use config::{FeatureInput, ProcessingConfig};
pub use features::{
    AsymmetryConfig, BandFeatures, FeatureBundle, FeatureConfig, FeatureExtractor,
    FrequencyBand, ImageTensor,
};
pub use filters::{BandpassFilter, FilterConfig};
pub use normalize::Standardizer;
pub use pipeline::{PipelineBuilder, PipelineOutput, WindowPipeline};
pub use processor::{ProcessorType, StageMetrics, WindowProcessor};
pub use spectrogram::{Spectrogram, StftConfig, StftPlan};
