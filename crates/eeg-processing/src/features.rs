//! Feature extraction for windowed EEG
//!
//! Produces the two model inputs for a window:
//! - a spectrogram image: channel-averaged `ln(1 + |STFT|)`, resampled to
//!   `H x W` and replicated into three identical planes
//! - a feature vector: per-band differential entropy averaged over channels,
//!   followed by a two-channel alpha asymmetry term, tiled to length `K`

use crate::filters::BandpassFilter;
use crate::spectrogram::{resize_bilinear, StftConfig, StftPlan};
use eeg_core::{config_error, EegError, EegResult, Window};
use serde::{Deserialize, Serialize};
use std::f64::consts::{E, PI};

/// Number of identical planes in the spectrogram image
pub const IMAGE_PLANES: usize = 3;

/// Added to band variances before taking logarithms
pub const VARIANCE_FLOOR: f64 = 1e-6;

/// Frequency band definition for spectral analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub name: String,
    pub low_hz: f32,
    pub high_hz: f32,
}

impl FrequencyBand {
    pub fn new(name: &str, low_hz: f32, high_hz: f32) -> Self {
        Self {
            name: name.to_string(),
            low_hz,
            high_hz,
        }
    }

    /// Classical EEG rhythms
    pub fn eeg_bands() -> Vec<FrequencyBand> {
        vec![
            FrequencyBand::new("delta", 1.0, 4.0),
            FrequencyBand::new("theta", 4.0, 8.0),
            FrequencyBand::alpha(),
            FrequencyBand::new("beta", 13.0, 30.0),
            FrequencyBand::new("gamma", 30.0, 45.0),
        ]
    }

    pub fn alpha() -> Self {
        FrequencyBand::new("alpha", 8.0, 13.0)
    }
}

/// Channel pair and band for the asymmetry term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsymmetryConfig {
    pub left_channel: usize,
    pub right_channel: usize,
    pub band: FrequencyBand,
}

impl Default for AsymmetryConfig {
    fn default() -> Self {
        Self {
            left_channel: 0,
            right_channel: 1,
            band: FrequencyBand::alpha(),
        }
    }
}

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Spectrogram image height
    pub image_height: usize,
    /// Spectrogram image width
    pub image_width: usize,
    /// Length of the tiled feature vector
    pub vector_len: usize,
    /// Butterworth order of the band filters
    pub band_filter_order: usize,
    pub bands: Vec<FrequencyBand>,
    pub asymmetry: AsymmetryConfig,
}

impl FeatureConfig {
    /// Number of distinct values before tiling
    pub fn base_len(&self) -> usize {
        self.bands.len() + 1
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            image_height: 224,
            image_width: 224,
            vector_len: 26,
            band_filter_order: 4,
            bands: FrequencyBand::eeg_bands(),
            asymmetry: AsymmetryConfig::default(),
        }
    }
}

/// Spectrogram image, plane-major `[3, H, W]`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl ImageTensor {
    /// Replicate one `H x W` plane into all planes
    pub fn replicate(plane: Vec<f32>, height: usize, width: usize) -> EegResult<Self> {
        if plane.len() != height * width {
            return Err(EegError::ProcessingError {
                message: format!(
                    "Image plane holds {} values, expected {}x{}",
                    plane.len(),
                    height,
                    width
                ),
            });
        }
        let mut data = Vec::with_capacity(IMAGE_PLANES * plane.len());
        for _ in 0..IMAGE_PLANES {
            data.extend_from_slice(&plane);
        }
        Ok(Self { height, width, data })
    }

    pub fn shape(&self) -> [usize; 3] {
        [IMAGE_PLANES, self.height, self.width]
    }

    pub fn plane(&self, index: usize) -> Option<&[f32]> {
        let size = self.height * self.width;
        self.data.get(index * size..(index + 1) * size)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Both model inputs for one window
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBundle {
    pub image: ImageTensor,
    pub vector: Vec<f32>,
}

/// Untiled band statistics of a window
#[derive(Debug, Clone, PartialEq)]
pub struct BandFeatures {
    /// Channel-averaged differential entropy, one value per band
    pub differential_entropy: Vec<f32>,
    /// Log-variance difference between the left and right channel
    pub asymmetry: f32,
}

impl BandFeatures {
    pub fn base_vector(&self) -> Vec<f32> {
        let mut base = self.differential_entropy.clone();
        base.push(self.asymmetry);
        base
    }
}

/// Stateless extractor; filters and FFT plan are built once at construction
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    sampling_rate: f32,
    band_filters: Vec<BandpassFilter>,
    asymmetry_filter: BandpassFilter,
    stft: StftPlan,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig, sampling_rate: f32) -> EegResult<Self> {
        if config.image_height == 0 || config.image_width == 0 {
            return Err(config_error!(
                "Image size must be non-zero, got {}x{}",
                config.image_height,
                config.image_width
            ));
        }
        if config.vector_len == 0 {
            return Err(config_error!("Feature vector length must be greater than 0"));
        }
        if config.bands.is_empty() {
            return Err(config_error!("At least one frequency band is required"));
        }
        if config.asymmetry.left_channel == config.asymmetry.right_channel {
            return Err(config_error!(
                "Asymmetry needs two distinct channels, got {} twice",
                config.asymmetry.left_channel
            ));
        }

        let band_filters = config
            .bands
            .iter()
            .map(|band| build_band_filter(band, config.band_filter_order, sampling_rate))
            .collect::<EegResult<Vec<_>>>()?;
        let asymmetry_filter =
            build_band_filter(&config.asymmetry.band, config.band_filter_order, sampling_rate)?;
        let stft = StftPlan::new(StftConfig::for_sampling_rate(sampling_rate)?);

        Ok(Self {
            config,
            sampling_rate,
            band_filters,
            asymmetry_filter,
            stft,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn sampling_rate(&self) -> f32 {
        self.sampling_rate
    }

    /// Shortest window the band filters and the STFT accept
    pub fn min_samples(&self) -> usize {
        use crate::processor::WindowProcessor;

        self.band_filters
            .iter()
            .chain(std::iter::once(&self.asymmetry_filter))
            .map(|f| f.min_samples())
            .chain(std::iter::once(self.stft.config().segment_len))
            .max()
            .unwrap_or(1)
    }

    /// Channels needed by the asymmetry term
    pub fn min_channels(&self) -> usize {
        self.config.asymmetry.left_channel.max(self.config.asymmetry.right_channel) + 1
    }

    /// Extract both model inputs from a window
    pub fn extract(&self, window: &Window) -> EegResult<FeatureBundle> {
        let samples = window.samples_per_channel();
        let required = self.min_samples();
        if samples < required {
            return Err(EegError::InsufficientSamples {
                required,
                actual: samples,
            });
        }
        if window.channel_count() < self.min_channels() {
            return Err(EegError::ChannelMismatch {
                expected: self.min_channels(),
                actual: window.channel_count(),
            });
        }

        let channels = window.all_channels();
        let image = self.spectrogram_image(&channels)?;
        let bands = self.band_features(&channels)?;
        let vector = tile_to_length(&bands.base_vector(), self.config.vector_len);

        Ok(FeatureBundle { image, vector })
    }

    /// Channel-averaged log spectrogram resampled into a 3-plane image
    pub fn spectrogram_image(&self, channels: &[Vec<f32>]) -> EegResult<ImageTensor> {
        let spectrogram = self.stft.mean_log_magnitude(channels)?;
        let (height, width) = (self.config.image_height, self.config.image_width);
        let plane = resize_bilinear(&spectrogram, height, width);
        ImageTensor::replicate(plane, height, width)
    }

    /// Differential entropy per band and the asymmetry term
    pub fn band_features(&self, channels: &[Vec<f32>]) -> EegResult<BandFeatures> {
        if channels.is_empty() {
            return Err(EegError::ChannelMismatch { expected: 1, actual: 0 });
        }

        let mut differential_entropy = Vec::with_capacity(self.band_filters.len());
        for filter in &self.band_filters {
            let mut total = 0.0;
            for channel in channels {
                let filtered = filter.filter_channel(channel)?;
                total += differential_entropy_of(variance(&filtered) + VARIANCE_FLOOR);
            }
            differential_entropy.push((total / channels.len() as f64) as f32);
        }

        let left = self.channel(channels, self.config.asymmetry.left_channel)?;
        let right = self.channel(channels, self.config.asymmetry.right_channel)?;
        let left_var = variance(&self.asymmetry_filter.filter_channel(left)?);
        let right_var = variance(&self.asymmetry_filter.filter_channel(right)?);
        let asymmetry = (left_var + VARIANCE_FLOOR).ln() - (right_var + VARIANCE_FLOOR).ln();

        Ok(BandFeatures {
            differential_entropy,
            asymmetry: asymmetry as f32,
        })
    }

    fn channel<'a>(&self, channels: &'a [Vec<f32>], index: usize) -> EegResult<&'a [f32]> {
        channels
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| EegError::ChannelMismatch {
                expected: self.min_channels(),
                actual: channels.len(),
            })
    }
}

fn build_band_filter(band: &FrequencyBand, order: usize, sampling_rate: f32) -> EegResult<BandpassFilter> {
    BandpassFilter::new(band.low_hz, band.high_hz, order, sampling_rate).map_err(|e| match e {
        EegError::ConfigurationError { message } => {
            config_error!("Band '{}': {}", band.name, message)
        }
        other => other,
    })
}

/// Differential entropy of a Gaussian with the given variance
pub fn differential_entropy_of(variance: f64) -> f64 {
    0.5 * (2.0 * PI * E * variance).ln()
}

/// Population variance
fn variance(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// Repeat `base` cyclically and truncate to `len`
pub fn tile_to_length(base: &[f32], len: usize) -> Vec<f32> {
    base.iter().copied().cycle().take(len).collect()
}
