//! Model predictions and the timestamped records published for them

use serde::{Deserialize, Serialize};

/// Positional output of the regression model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub valence: f32,
    pub arousal: f32,
}

/// Immutable result of one processing cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Epoch seconds at which the record was produced
    pub ts: f64,
    pub valence: f32,
    pub arousal: f32,
    /// Model version tag
    pub version: String,
}

impl ResultRecord {
    pub fn new(ts: f64, prediction: Prediction, version: impl Into<String>) -> Self {
        ResultRecord {
            ts,
            valence: prediction.valence,
            arousal: prediction.arousal,
            version: version.into(),
        }
    }

    /// Placeholder served before the first cycle has completed
    pub fn empty() -> Self {
        ResultRecord {
            ts: 0.0,
            valence: 0.0,
            arousal: 0.0,
            version: String::new(),
        }
    }
}

impl Default for ResultRecord {
    fn default() -> Self {
        Self::empty()
    }
}
