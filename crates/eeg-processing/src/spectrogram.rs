//! Short-time Fourier transform and spectrogram resampling
//!
//! Frames use a periodic Hann window with the signal zero-extended by half a
//! segment at both ends and zero-padded at the tail to a whole number of hops.
//! Each frame spectrum is scaled by the inverse window sum.

use eeg_core::{config_error, EegError, EegResult};
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Segment geometry for the STFT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StftConfig {
    /// Samples per segment
    pub segment_len: usize,
    /// Samples shared by consecutive segments
    pub overlap: usize,
}

impl StftConfig {
    /// Half-second segments with quarter-second overlap
    pub fn for_sampling_rate(sampling_rate: f32) -> EegResult<Self> {
        let rate = sampling_rate.floor() as usize;
        Self::new(rate / 2, rate / 4)
    }

    pub fn new(segment_len: usize, overlap: usize) -> EegResult<Self> {
        if segment_len < 2 {
            return Err(config_error!(
                "STFT segment must hold at least 2 samples, got {}",
                segment_len
            ));
        }
        if overlap >= segment_len {
            return Err(config_error!(
                "STFT overlap {} must be smaller than the segment length {}",
                overlap,
                segment_len
            ));
        }
        Ok(Self { segment_len, overlap })
    }

    pub fn hop(&self) -> usize {
        self.segment_len - self.overlap
    }

    /// Number of one-sided frequency bins
    pub fn freq_bins(&self) -> usize {
        self.segment_len / 2 + 1
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        let padded = self.padded_len(len);
        (padded - self.segment_len) / self.hop() + 1
    }

    fn padded_len(&self, len: usize) -> usize {
        let extended = len + 2 * (self.segment_len / 2);
        let hop = self.hop();
        let tail = (hop - (extended - self.segment_len) % hop) % hop;
        extended + tail
    }
}

/// Frequency-by-time magnitude grid, row-major by frequency
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    freq_bins: usize,
    frames: usize,
    data: Vec<f64>,
}

impl Spectrogram {
    pub fn freq_bins(&self) -> usize {
        self.freq_bins
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn get(&self, freq: usize, frame: usize) -> f64 {
        self.data[freq * self.frames + frame]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Planned STFT shared across cycles
#[derive(Clone)]
pub struct StftPlan {
    config: StftConfig,
    window: Vec<f64>,
    scale: f64,
    fft: Arc<dyn RealToComplex<f64>>,
}

impl fmt::Debug for StftPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StftPlan")
            .field("config", &self.config)
            .field("scale", &self.scale)
            .finish()
    }
}

impl StftPlan {
    pub fn new(config: StftConfig) -> Self {
        let n = config.segment_len;
        let window: Vec<f64> = (0..n)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
            .collect();
        let scale = 1.0 / window.iter().sum::<f64>();
        let fft = RealFftPlanner::<f64>::new().plan_fft_forward(n);

        Self {
            config,
            window,
            scale,
            fft,
        }
    }

    pub fn config(&self) -> &StftConfig {
        &self.config
    }

    /// `ln(1 + |STFT|)` of every channel, averaged over channels
    pub fn mean_log_magnitude(&self, channels: &[Vec<f32>]) -> EegResult<Spectrogram> {
        let len = channels.first().map(Vec::len).unwrap_or(0);
        if channels.is_empty() {
            return Err(EegError::ChannelMismatch { expected: 1, actual: 0 });
        }
        if len < self.config.segment_len {
            return Err(EegError::InsufficientSamples {
                required: self.config.segment_len,
                actual: len,
            });
        }

        let freq_bins = self.config.freq_bins();
        let frames = self.config.frame_count(len);
        let mut sum = vec![0.0f64; freq_bins * frames];

        let mut padded = vec![0.0f64; self.config.padded_len(len)];
        let mut segment = self.fft.make_input_vec();
        let mut spectrum: Vec<Complex64> = self.fft.make_output_vec();
        let offset = self.config.segment_len / 2;
        let hop = self.config.hop();

        for channel in channels {
            if channel.len() != len {
                return Err(EegError::ProcessingError {
                    message: format!("Channel lengths differ: {} vs {}", len, channel.len()),
                });
            }
            for (dst, &src) in padded[offset..offset + len].iter_mut().zip(channel) {
                *dst = src as f64;
            }

            for frame in 0..frames {
                let start = frame * hop;
                for ((dst, &x), &w) in segment
                    .iter_mut()
                    .zip(&padded[start..start + self.config.segment_len])
                    .zip(&self.window)
                {
                    *dst = x * w;
                }

                self.fft
                    .process(&mut segment, &mut spectrum)
                    .map_err(|e| EegError::ProcessingError {
                        message: format!("FFT failed: {}", e),
                    })?;

                for (freq, bin) in spectrum.iter().enumerate() {
                    sum[freq * frames + frame] += (bin.norm() * self.scale).ln_1p();
                }
            }
        }

        let count = channels.len() as f64;
        for value in &mut sum {
            *value /= count;
        }

        Ok(Spectrogram {
            freq_bins,
            frames,
            data: sum,
        })
    }
}

/// Bilinear resample to `height` x `width` with corner-aligned sample grids
pub fn resize_bilinear(spectrogram: &Spectrogram, height: usize, width: usize) -> Vec<f32> {
    let in_h = spectrogram.freq_bins;
    let in_w = spectrogram.frames;

    // rows first, then columns
    let row_taps: Vec<_> = (0..height).map(|o| interpolation_taps(o, in_h, height)).collect();
    let mut rows = vec![0.0f64; height * in_w];
    for (out_row, &(i0, i1, frac)) in row_taps.iter().enumerate() {
        for col in 0..in_w {
            let a = spectrogram.get(i0, col);
            let b = spectrogram.get(i1, col);
            rows[out_row * in_w + col] = a + (b - a) * frac;
        }
    }

    let col_taps: Vec<_> = (0..width).map(|o| interpolation_taps(o, in_w, width)).collect();
    let mut output = Vec::with_capacity(height * width);
    for out_row in 0..height {
        let row = &rows[out_row * in_w..(out_row + 1) * in_w];
        for &(j0, j1, frac) in &col_taps {
            output.push((row[j0] + (row[j1] - row[j0]) * frac) as f32);
        }
    }
    output
}

/// Source indices and weight for output position `out` on an `in_len` grid
fn interpolation_taps(out: usize, in_len: usize, out_len: usize) -> (usize, usize, f64) {
    if out_len <= 1 || in_len <= 1 {
        return (0, 0, 0.0);
    }
    let position = out as f64 * (in_len - 1) as f64 / (out_len - 1) as f64;
    let lower = (position.floor() as usize).min(in_len - 1);
    let upper = (lower + 1).min(in_len - 1);
    (lower, upper, position - lower as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_at_256_hz() {
        let config = StftConfig::for_sampling_rate(256.0).unwrap();
        assert_eq!(config.segment_len, 128);
        assert_eq!(config.overlap, 64);
        assert_eq!(config.hop(), 64);
        assert_eq!(config.freq_bins(), 65);
        assert_eq!(config.frame_count(1280), 21);
        // tail padding rounds up to a whole hop
        assert_eq!(config.frame_count(1281), 22);
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(StftConfig::for_sampling_rate(3.0).is_err());
        assert!(StftConfig::new(16, 16).is_err());
    }

    #[test]
    fn test_silence_has_zero_log_magnitude() {
        let plan = StftPlan::new(StftConfig::for_sampling_rate(256.0).unwrap());
        let spec = plan.mean_log_magnitude(&[vec![0.0; 1280], vec![0.0; 1280]]).unwrap();
        assert_eq!(spec.freq_bins(), 65);
        assert_eq!(spec.frames(), 21);
        assert!(spec.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        // 16 Hz at 256 Hz with 128-sample segments lands on bin 8
        let plan = StftPlan::new(StftConfig::for_sampling_rate(256.0).unwrap());
        let tone: Vec<f32> = (0..1280)
            .map(|i| (2.0 * std::f32::consts::PI * 16.0 * i as f32 / 256.0).sin())
            .collect();
        let spec = plan.mean_log_magnitude(&[tone]).unwrap();

        let frame = 10;
        let peak_bin = (0..spec.freq_bins())
            .max_by(|&a, &b| spec.get(a, frame).total_cmp(&spec.get(b, frame)))
            .unwrap();
        assert_eq!(peak_bin, 8);
        // Hann-windowed unit sine has scaled magnitude 0.5 at its bin
        assert!((spec.get(8, frame) - 0.5f64.ln_1p()).abs() < 1e-5);
    }

    #[test]
    fn test_channels_are_averaged() {
        let plan = StftPlan::new(StftConfig::new(8, 4).unwrap());
        let loud: Vec<f32> = (0..32).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let single = plan.mean_log_magnitude(&[loud.clone()]).unwrap();
        let mixed = plan.mean_log_magnitude(&[loud, vec![0.0; 32]]).unwrap();

        for (s, m) in single.as_slice().iter().zip(mixed.as_slice()) {
            assert!((s / 2.0 - m).abs() < 1e-12);
        }
    }

    #[test]
    fn test_short_signal_is_rejected() {
        let plan = StftPlan::new(StftConfig::for_sampling_rate(256.0).unwrap());
        assert_eq!(
            plan.mean_log_magnitude(&[vec![0.0; 100]]),
            Err(EegError::InsufficientSamples { required: 128, actual: 100 })
        );
    }

    #[test]
    fn test_resize_keeps_corners_and_interpolates() {
        let spec = Spectrogram {
            freq_bins: 2,
            frames: 2,
            data: vec![0.0, 1.0, 2.0, 3.0],
        };
        let out = resize_bilinear(&spec, 3, 3);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.0, 1.5, 2.0, 2.0, 2.5, 3.0]);
    }

    #[test]
    fn test_resize_to_224() {
        let plan = StftPlan::new(StftConfig::for_sampling_rate(256.0).unwrap());
        let spec = plan.mean_log_magnitude(&[vec![0.25; 1280]]).unwrap();
        let out = resize_bilinear(&spec, 224, 224);
        assert_eq!(out.len(), 224 * 224);
        assert_eq!(out[0], spec.get(0, 0) as f32);
        assert_eq!(out[224 * 224 - 1], spec.get(64, 20) as f32);
    }

    #[test]
    fn test_resize_single_output_samples_origin() {
        let spec = Spectrogram {
            freq_bins: 2,
            frames: 3,
            data: vec![5.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        };
        assert_eq!(resize_bilinear(&spec, 1, 1), vec![5.0]);
    }
}
