//! Zero-phase Butterworth band-pass filtering
//!
//! The filter is designed once as a cascade of second-order sections and then
//! applied forward and backward over each channel, so the output has squared
//! magnitude response and no phase shift. Signal edges are handled with an odd
//! reflection of length `3 * (2 * sections + 1)` and steady-state initial
//! conditions scaled to the first sample of each pass.

use crate::processor::{ProcessorType, WindowProcessor};
use eeg_core::{config_error, EegError, EegResult, Window};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Imaginary part below which a digital pole is treated as real
const REAL_POLE_TOLERANCE: f64 = 1e-10;

/// Band-pass filter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Lower cutoff (Hz)
    pub low_hz: f32,
    /// Upper cutoff (Hz)
    pub high_hz: f32,
    /// Butterworth prototype order
    pub order: usize,
}

impl FilterConfig {
    /// Create bandpass filter configuration
    pub fn bandpass(low_hz: f32, high_hz: f32, order: usize) -> Self {
        Self {
            low_hz,
            high_hz,
            order,
        }
    }

    /// Design the filter for a sampling rate
    pub fn build(&self, sampling_rate: f32) -> EegResult<BandpassFilter> {
        BandpassFilter::new(self.low_hz, self.high_hz, self.order, sampling_rate)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::bandpass(0.5, 45.0, 4)
    }
}

/// One biquad of the cascade, `a[0]` normalised to 1
#[derive(Debug, Clone, Copy, PartialEq)]
struct SecondOrderSection {
    b: [f64; 3],
    a: [f64; 3],
}

impl SecondOrderSection {
    /// Section for a complex pole and its conjugate, with one zero at +1 and one at -1
    fn from_conjugate_pair(pole: Complex64) -> Self {
        Self {
            b: [1.0, 0.0, -1.0],
            a: [1.0, -2.0 * pole.re, pole.norm_sqr()],
        }
    }

    /// Section for two real poles
    fn from_real_pair(p1: f64, p2: f64) -> Self {
        Self {
            b: [1.0, 0.0, -1.0],
            a: [1.0, -(p1 + p2), p1 * p2],
        }
    }

    /// Complex response at `z`
    fn response(&self, z: Complex64) -> Complex64 {
        let z1 = z.inv();
        let z2 = z1 * z1;
        let num = Complex64::new(self.b[0], 0.0) + z1 * self.b[1] + z2 * self.b[2];
        let den = Complex64::new(1.0, 0.0) + z1 * self.a[1] + z2 * self.a[2];
        num / den
    }

    /// Delay-line state reached after a unit step has settled
    fn step_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let det = 1.0 + a1 + a2;
        let c0 = b1 - a1 * b0;
        let c1 = b2 - a2 * b0;
        [(c0 + c1) / det, ((1.0 + a1) * c1 - a2 * c0) / det]
    }

    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    /// Transposed direct form II, in place
    fn run(&self, signal: &mut [f64], mut state: [f64; 2]) {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        for x in signal.iter_mut() {
            let input = *x;
            let y = b0 * input + state[0];
            state[0] = b1 * input - a1 * y + state[1];
            state[1] = b2 * input - a2 * y;
            *x = y;
        }
    }
}

/// Zero-phase Butterworth band-pass filter
#[derive(Debug, Clone)]
pub struct BandpassFilter {
    low_hz: f32,
    high_hz: f32,
    order: usize,
    sampling_rate: f32,
    sections: Vec<SecondOrderSection>,
    /// Per-section step states, scaled by the gain of the preceding sections
    initial_states: Vec<[f64; 2]>,
}

impl BandpassFilter {
    /// Design a band-pass filter with cutoffs in Hz
    pub fn new(low_hz: f32, high_hz: f32, order: usize, sampling_rate: f32) -> EegResult<Self> {
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(config_error!("Sampling rate must be positive, got {}", sampling_rate));
        }
        if order == 0 {
            return Err(config_error!("Filter order must be at least 1"));
        }
        let nyquist = sampling_rate / 2.0;
        if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
            return Err(config_error!(
                "Band-pass cutoffs must satisfy 0 < low < high < {} Hz, got {}-{} Hz",
                nyquist,
                low_hz,
                high_hz
            ));
        }

        let sections = design_sections(low_hz as f64, high_hz as f64, order, sampling_rate as f64)?;

        let mut initial_states = Vec::with_capacity(sections.len());
        let mut gain = 1.0;
        for section in &sections {
            let [s0, s1] = section.step_state();
            initial_states.push([s0 * gain, s1 * gain]);
            gain *= section.dc_gain();
        }

        tracing::debug!(
            low_hz,
            high_hz,
            order,
            sampling_rate,
            sections = sections.len(),
            "Designed band-pass filter"
        );

        Ok(Self {
            low_hz,
            high_hz,
            order,
            sampling_rate,
            sections,
            initial_states,
        })
    }

    pub fn low_hz(&self) -> f32 {
        self.low_hz
    }

    pub fn high_hz(&self) -> f32 {
        self.high_hz
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn sampling_rate(&self) -> f32 {
        self.sampling_rate
    }

    /// Reflection length added at each edge
    pub fn padding(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Magnitude of the single-pass response at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f32) -> f64 {
        let omega = 2.0 * PI * freq_hz as f64 / self.sampling_rate as f64;
        let z = Complex64::from_polar(1.0, omega);
        self.sections
            .iter()
            .map(|s| s.response(z))
            .fold(Complex64::new(1.0, 0.0), |acc, h| acc * h)
            .norm()
    }

    /// Zero-phase filter every channel of a window
    pub fn filter(&self, window: &Window) -> EegResult<Window> {
        self.process(window)
    }

    /// Filter one channel forward and backward
    pub fn filter_channel(&self, samples: &[f32]) -> EegResult<Vec<f32>> {
        let n = samples.len();
        let required = self.min_samples();
        if n < required {
            return Err(EegError::InsufficientSamples { required, actual: n });
        }

        let pad = self.padding();
        let first = samples[0] as f64;
        let last = samples[n - 1] as f64;

        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - samples[i] as f64));
        extended.extend(samples.iter().map(|&v| v as f64));
        extended.extend((1..=pad).map(|i| 2.0 * last - samples[n - 1 - i] as f64));

        let x0 = extended[0];
        self.run_cascade(&mut extended, x0);

        extended.reverse();
        let y0 = extended[0];
        self.run_cascade(&mut extended, y0);
        extended.reverse();

        Ok(extended[pad..pad + n].iter().map(|&v| v as f32).collect())
    }

    fn run_cascade(&self, signal: &mut [f64], initial: f64) {
        for (section, state) in self.sections.iter().zip(&self.initial_states) {
            section.run(signal, [state[0] * initial, state[1] * initial]);
        }
    }
}

impl WindowProcessor for BandpassFilter {
    fn process(&self, input: &Window) -> EegResult<Window> {
        let required = self.min_samples();
        if input.samples_per_channel() < required {
            return Err(EegError::InsufficientSamples {
                required,
                actual: input.samples_per_channel(),
            });
        }
        input.map_channels(|channel| self.filter_channel(channel))
    }

    fn name(&self) -> &str {
        "Band-pass Filter"
    }

    fn min_samples(&self) -> usize {
        self.padding() + 1
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Filter
    }
}

/// Butterworth band-pass as second-order sections.
///
/// Analog prototype poles are prewarped to the band edges, shifted to the
/// band-pass by the low-pass to band-pass substitution and mapped with the
/// bilinear transform. Each section is scaled to unit gain at the geometric
/// band centre.
fn design_sections(low: f64, high: f64, order: usize, fs: f64) -> EegResult<Vec<SecondOrderSection>> {
    let fs2 = 2.0 * fs;
    let w_low = fs2 * (PI * low / fs).tan();
    let w_high = fs2 * (PI * high / fs).tan();
    let bandwidth = w_high - w_low;
    let w0 = (w_low * w_high).sqrt();

    let n = order as f64;
    let fs2c = Complex64::new(fs2, 0.0);
    let mut poles = Vec::with_capacity(2 * order);
    for k in 0..order {
        let m = -(n - 1.0) + 2.0 * k as f64;
        let prototype = -Complex64::from_polar(1.0, PI * m / (2.0 * n));
        let shifted = prototype * (bandwidth / 2.0);
        let spread = (shifted * shifted - w0 * w0).sqrt();
        for analog in [shifted + spread, shifted - spread] {
            poles.push((fs2c + analog) / (fs2c - analog));
        }
    }

    let mut sections = Vec::with_capacity(order);
    let mut real_poles = Vec::new();
    for pole in &poles {
        if pole.im > REAL_POLE_TOLERANCE {
            sections.push(SecondOrderSection::from_conjugate_pair(*pole));
        } else if pole.im.abs() <= REAL_POLE_TOLERANCE {
            real_poles.push(pole.re);
        }
    }

    real_poles.sort_by(|a, b| a.total_cmp(b));
    let pairs = real_poles.chunks_exact(2);
    if !pairs.remainder().is_empty() {
        return Err(EegError::ProcessingError {
            message: "Band-pass design produced an unpaired real pole".to_string(),
        });
    }
    for pair in pairs {
        sections.push(SecondOrderSection::from_real_pair(pair[0], pair[1]));
    }

    if sections.len() != order {
        return Err(EegError::ProcessingError {
            message: format!(
                "Band-pass design produced {} sections for order {}",
                sections.len(),
                order
            ),
        });
    }

    let centre = Complex64::from_polar(1.0, 2.0 * (w0 / fs2).atan());
    for section in &mut sections {
        let magnitude = section.response(centre).norm();
        if !(magnitude.is_finite() && magnitude > 0.0) {
            return Err(EegError::ProcessingError {
                message: "Band-pass section has no gain at the band centre".to_string(),
            });
        }
        for coefficient in &mut section.b {
            *coefficient /= magnitude;
        }
    }

    Ok(sections)
}
