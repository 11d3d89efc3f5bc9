//! Inference boundary
//!
//! The model is an opaque callable over two batched tensors. The gateway owns
//! the shape contract on both sides and maps the output positionally to
//! valence and arousal.

use eeg_core::{config_error, EegError, EegResult, Prediction};
use eeg_processing::{FeatureBundle, FeatureConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Dense row-major `f32` tensor
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> EegResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(EegError::InferenceError {
                message: format!(
                    "Tensor shape {:?} needs {} values, got {}",
                    shape,
                    expected,
                    data.len()
                ),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Opaque regression model taking `(1, 3, H, W)` and `(1, K)` inputs
pub trait InferenceModel: Send + Sync {
    /// Run one forward pass
    fn run(&self, image: &Tensor, vector: &Tensor) -> EegResult<Tensor>;

    fn name(&self) -> &str;
}

/// Shape-checked front of an [`InferenceModel`]
pub struct InferenceGateway {
    model: Arc<dyn InferenceModel>,
    image_shape: [usize; 3],
    vector_len: usize,
    version: String,
}

impl InferenceGateway {
    pub fn new(model: Arc<dyn InferenceModel>, features: &FeatureConfig, version: &str) -> EegResult<Self> {
        if version.trim().is_empty() {
            return Err(config_error!("Model version tag must not be empty"));
        }
        Ok(Self {
            model,
            image_shape: [3, features.image_height, features.image_width],
            vector_len: features.vector_len,
            version: version.to_string(),
        })
    }

    /// Version tag stamped on every record
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Predict valence and arousal for one feature bundle
    pub fn predict(&self, bundle: &FeatureBundle) -> EegResult<Prediction> {
        let (image, vector) = self.batch(bundle)?;
        let output = self.model.run(&image, &vector)?;

        if output.shape() != [1, 2] {
            return Err(EegError::InferenceError {
                message: format!(
                    "Model '{}' returned shape {:?}, expected [1, 2]",
                    self.model.name(),
                    output.shape()
                ),
            });
        }

        let values = output.as_slice();
        Ok(Prediction {
            valence: values[0],
            arousal: values[1],
        })
    }

    fn batch(&self, bundle: &FeatureBundle) -> EegResult<(Tensor, Tensor)> {
        if bundle.image.shape() != self.image_shape {
            return Err(EegError::InferenceError {
                message: format!(
                    "Image shape {:?} does not match model input {:?}",
                    bundle.image.shape(),
                    self.image_shape
                ),
            });
        }
        if bundle.vector.len() != self.vector_len {
            return Err(EegError::InferenceError {
                message: format!(
                    "Feature vector has {} values, model expects {}",
                    bundle.vector.len(),
                    self.vector_len
                ),
            });
        }

        let [planes, height, width] = self.image_shape;
        let image = Tensor::new(vec![1, planes, height, width], bundle.image.as_slice().to_vec())?;
        let vector = Tensor::new(vec![1, self.vector_len], bundle.vector.clone())?;
        Ok((image, vector))
    }
}

/// Model returning a fixed prediction
#[derive(Debug, Clone)]
pub struct StaticModel {
    output: Prediction,
}

impl StaticModel {
    pub fn new(valence: f32, arousal: f32) -> Self {
        Self {
            output: Prediction { valence, arousal },
        }
    }
}

impl InferenceModel for StaticModel {
    fn run(&self, _image: &Tensor, _vector: &Tensor) -> EegResult<Tensor> {
        Tensor::new(vec![1, 2], vec![self.output.valence, self.output.arousal])
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Linear map of the feature vector and mean image intensity, squashed with `tanh`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearReadout {
    pub valence_weights: Vec<f32>,
    pub arousal_weights: Vec<f32>,
    /// Weight of the mean image intensity for `[valence, arousal]`
    pub image_weights: [f32; 2],
    pub bias: [f32; 2],
}

impl LinearReadout {
    /// Readout over the default feature layout.
    ///
    /// Valence follows alpha asymmetry; arousal follows beta minus alpha
    /// entropy.
    pub fn affective(vector_len: usize) -> Self {
        let mut valence_weights = vec![0.0; vector_len];
        let mut arousal_weights = vec![0.0; vector_len];
        if vector_len >= 6 {
            valence_weights[5] = 0.5;
            arousal_weights[2] = -0.4;
            arousal_weights[3] = 0.4;
        }
        Self {
            valence_weights,
            arousal_weights,
            image_weights: [0.0, 0.1],
            bias: [0.0, 0.0],
        }
    }

    pub fn validate(&self, vector_len: usize) -> EegResult<()> {
        if self.valence_weights.len() != vector_len || self.arousal_weights.len() != vector_len {
            return Err(config_error!(
                "Linear readout weights have {}/{} entries, feature vector has {}",
                self.valence_weights.len(),
                self.arousal_weights.len(),
                vector_len
            ));
        }
        Ok(())
    }
}

impl InferenceModel for LinearReadout {
    fn run(&self, image: &Tensor, vector: &Tensor) -> EegResult<Tensor> {
        let features = vector.as_slice();
        if features.len() != self.valence_weights.len() || features.len() != self.arousal_weights.len() {
            return Err(EegError::InferenceError {
                message: format!(
                    "Linear readout expects {} features, got {}",
                    self.valence_weights.len(),
                    features.len()
                ),
            });
        }

        let pixels = image.as_slice();
        let intensity = if pixels.is_empty() {
            0.0
        } else {
            pixels.iter().map(|&v| v as f64).sum::<f64>() / pixels.len() as f64
        };

        let dot = |weights: &[f32]| -> f64 {
            weights
                .iter()
                .zip(features)
                .map(|(&w, &x)| w as f64 * x as f64)
                .sum()
        };
        let valence = self.bias[0] as f64 + dot(&self.valence_weights) + self.image_weights[0] as f64 * intensity;
        let arousal = self.bias[1] as f64 + dot(&self.arousal_weights) + self.image_weights[1] as f64 * intensity;

        Tensor::new(vec![1, 2], vec![valence.tanh() as f32, arousal.tanh() as f32])
    }

    fn name(&self) -> &str {
        "linear-readout"
    }
}

/// Which bundled model to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    Static { valence: f32, arousal: f32 },
    Linear(LinearReadout),
}

impl ModelConfig {
    pub fn build(&self, vector_len: usize) -> EegResult<Arc<dyn InferenceModel>> {
        match self {
            ModelConfig::Static { valence, arousal } => Ok(Arc::new(StaticModel::new(*valence, *arousal))),
            ModelConfig::Linear(readout) => {
                readout.validate(vector_len)?;
                Ok(Arc::new(readout.clone()))
            }
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::Linear(LinearReadout::affective(FeatureConfig::default().vector_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_processing::ImageTensor;

    struct WrongShapeModel;

    impl InferenceModel for WrongShapeModel {
        fn run(&self, _image: &Tensor, _vector: &Tensor) -> EegResult<Tensor> {
            Tensor::new(vec![1, 3], vec![0.1, 0.2, 0.3])
        }

        fn name(&self) -> &str {
            "wrong-shape"
        }
    }

    fn small_config() -> FeatureConfig {
        FeatureConfig {
            image_height: 4,
            image_width: 5,
            vector_len: 6,
            ..FeatureConfig::default()
        }
    }

    fn bundle(height: usize, width: usize, vector: Vec<f32>) -> FeatureBundle {
        FeatureBundle {
            image: ImageTensor::replicate(vec![0.5; height * width], height, width).unwrap(),
            vector,
        }
    }

    #[test]
    fn test_static_model_maps_positionally() {
        let gateway =
            InferenceGateway::new(Arc::new(StaticModel::new(0.25, -0.75)), &small_config(), "va@test").unwrap();
        let prediction = gateway.predict(&bundle(4, 5, vec![0.0; 6])).unwrap();
        assert_eq!(prediction, Prediction { valence: 0.25, arousal: -0.75 });
        assert_eq!(gateway.version(), "va@test");
    }

    #[test]
    fn test_wrong_output_shape_is_rejected() {
        let gateway = InferenceGateway::new(Arc::new(WrongShapeModel), &small_config(), "v1").unwrap();
        let result = gateway.predict(&bundle(4, 5, vec![0.0; 6]));
        assert!(matches!(result, Err(EegError::InferenceError { .. })));
    }

    #[test]
    fn test_wrong_input_shapes_are_rejected() {
        let gateway = InferenceGateway::new(Arc::new(StaticModel::new(0.0, 0.0)), &small_config(), "v1").unwrap();
        assert!(gateway.predict(&bundle(5, 4, vec![0.0; 6])).is_err());
        assert!(gateway.predict(&bundle(4, 5, vec![0.0; 7])).is_err());
    }

    #[test]
    fn test_linear_readout() {
        let readout = LinearReadout::affective(6);
        let image = Tensor::new(vec![1, 3, 1, 1], vec![1.0; 3]).unwrap();
        let vector = Tensor::new(vec![1, 6], vec![0.0, 0.0, 1.0, 2.0, 0.0, 1.0]).unwrap();
        let output = readout.run(&image, &vector).unwrap();

        assert_eq!(output.shape(), &[1, 2]);
        assert!((output.as_slice()[0] - 0.5f32.tanh()).abs() < 1e-6);
        assert!((output.as_slice()[1] - 0.5f32.tanh()).abs() < 1e-6);
    }

    #[test]
    fn test_model_config_validates_weights() {
        let config = ModelConfig::Linear(LinearReadout::affective(6));
        assert!(config.build(6).is_ok());
        assert!(config.build(26).is_err());
        assert!(ModelConfig::Static { valence: 0.0, arousal: 0.0 }.build(26).is_ok());
    }

    #[test]
    fn test_empty_version_is_rejected() {
        let result = InferenceGateway::new(Arc::new(StaticModel::new(0.0, 0.0)), &small_config(), " ");
        assert!(result.is_err());
    }

    #[test]
    fn test_tensor_shape_check() {
        assert!(Tensor::new(vec![1, 2], vec![1.0]).is_err());
        assert!(Tensor::new(vec![1, 3, 2, 2], vec![0.0; 12]).is_ok());
    }
}
