//! Configuration management for window processing

use crate::features::FeatureConfig;
use crate::filters::FilterConfig;
use crate::pipeline::WindowPipeline;
use eeg_core::{EegError, EegResult};
use serde::{Deserialize, Serialize};

/// Which preprocessing stage the feature extractor reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureInput {
    /// Band-passed and standardized window
    #[default]
    Standardized,
    /// Band-passed window before standardization
    Filtered,
}

/// Global processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Configuration name/profile
    pub name: String,
    /// Broadband filter applied before standardization
    pub bandpass: FilterConfig,
    /// Stage feeding the feature extractor
    #[serde(default)]
    pub feature_input: FeatureInput,
    pub features: FeatureConfig,
}

impl ProcessingConfig {
    /// Valence/arousal preset: 0.5-45 Hz order-4 band-pass, 224x224 image, 26 features
    pub fn valence_arousal() -> Self {
        ProcessingConfig {
            name: "Valence/Arousal".to_string(),
            bandpass: FilterConfig::bandpass(0.5, 45.0, 4),
            feature_input: FeatureInput::Standardized,
            features: FeatureConfig::default(),
        }
    }

    /// Validate against a sampling rate by building the pipeline it describes
    pub fn validate(&self, sampling_rate: f32) -> EegResult<()> {
        WindowPipeline::from_config(self, sampling_rate).map(|_| ())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> EegResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EegError::ConfigurationError {
            message: format!("Failed to serialize config: {}", e),
        })
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> EegResult<Self> {
        serde_json::from_str(json).map_err(|e| EegError::ConfigurationError {
            message: format!("Failed to parse config: {}", e),
        })
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self::valence_arousal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessingConfig::default();
        assert!(config.validate(256.0).is_ok());
        assert_eq!(config.feature_input, FeatureInput::Standardized);
        assert_eq!(config.features.vector_len, 26);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = ProcessingConfig::valence_arousal();
        config.feature_input = FeatureInput::Filtered;
        let json = config.to_json().unwrap();
        assert!(json.contains("\"filtered\""));

        let parsed = ProcessingConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_feature_input_uses_default() {
        let mut value = serde_json::to_value(ProcessingConfig::default()).unwrap();
        value.as_object_mut().unwrap().remove("feature_input");
        let parsed = ProcessingConfig::from_json(&value.to_string()).unwrap();
        assert_eq!(parsed.feature_input, FeatureInput::Standardized);
    }

    #[test]
    fn test_invalid_json() {
        let result = ProcessingConfig::from_json("{ not json");
        assert!(matches!(result, Err(EegError::ConfigurationError { .. })));
    }

    #[test]
    fn test_validation_rejects_band_above_nyquist() {
        let mut config = ProcessingConfig::default();
        config.bandpass.high_hz = 60.0;
        assert!(config.validate(100.0).is_err());
        assert!(config.validate(256.0).is_ok());
    }
}
