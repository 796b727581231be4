// src/processing/stage.rs
//! Cascaded filtering of the rolling window
//!
//! Every cycle refilters the entire current window from scratch; no filter
//! state is carried between cycles, so each cycle's output depends only on
//! the window contents. The per-call transient is absorbed by a symmetric
//! leading-edge pad whose first `padlen` output samples are discarded.

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::processing::design::{
    butter_bandstop, butter_highpass, padded_normalized, FilterCoefficients,
};

/// Extend `signal` on the leading edge by `padlen` samples of symmetric
/// reflection (edge sample included, folding as often as needed for pads
/// longer than the signal).
pub fn symmetric_pad_leading(signal: &[f64], padlen: usize) -> Vec<f64> {
    let n = signal.len();
    let period = 2 * n as i64;
    let mut padded = Vec::with_capacity(padlen + n);
    for v in -(padlen as i64)..0 {
        let m = v.rem_euclid(period);
        let index = if m < n as i64 { m } else { period - 1 - m };
        padded.push(signal[index as usize]);
    }
    padded.extend_from_slice(signal);
    padded
}

/// Run the filter forward across `x` from initial state `zi`, direct form
/// II transposed. Returns the output and the final state.
pub fn lfilter(coeffs: &FilterCoefficients, x: &[f64], zi: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let (b, a) = padded_normalized(&coeffs.b, &coeffs.a);
    let n = b.len();
    if n == 1 {
        return (x.iter().map(|&v| b[0] * v).collect(), Vec::new());
    }
    debug_assert_eq!(zi.len(), n - 1);

    let mut state = zi.to_vec();
    let mut y = Vec::with_capacity(x.len());
    for &input in x {
        let output = b[0] * input + state[0];
        for i in 0..n - 2 {
            state[i] = b[i + 1] * input + state[i + 1] - a[i + 1] * output;
        }
        state[n - 2] = b[n - 1] * input - a[n - 1] * output;
        y.push(output);
    }
    (y, state)
}

/// The two-filter cascade applied to every window snapshot.
///
/// Stage 1 rejects the mains interference band; stage 2 removes DC drift
/// while keeping the slow directional trend. Coefficients, per-filter
/// initial-condition templates, and the pad length are computed once.
pub struct FilterStage {
    notch: FilterCoefficients,
    notch_zi: Vec<f64>,
    trend: FilterCoefficients,
    trend_zi: Vec<f64>,
    padlen: usize,
}

impl FilterStage {
    /// Design both filters from the configuration.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let rate = config.sample_rate_hz as f64;
        let notch = butter_bandstop(
            config.filter_order,
            config.bands.line_noise.low_hz,
            config.bands.line_noise.high_hz,
            rate,
        )?;
        let trend = butter_highpass(config.filter_order, config.bands.trend.low_hz, rate)?;

        // Pad must cover the longer filter's transient, and at least a
        // tenth of the window for short windows.
        let tap_pad = 3 * notch.max_len().max(trend.max_len());
        let window_pad = (config.window_seconds * rate / 10.0 - 1.0).max(0.0) as usize;
        let padlen = tap_pad.max(window_pad);

        let notch_zi = notch.initial_state();
        let trend_zi = trend.initial_state();
        Ok(Self {
            notch,
            notch_zi,
            trend,
            trend_zi,
            padlen,
        })
    }

    /// Leading-edge pad length in samples.
    pub fn padlen(&self) -> usize {
        self.padlen
    }

    /// Filter one window snapshot: notch first, then the trend filter.
    /// Output length always equals input length.
    pub fn process(&self, window: &[f64]) -> Vec<f64> {
        let noise_free = self.apply(&self.notch, &self.notch_zi, window);
        self.apply(&self.trend, &self.trend_zi, &noise_free)
    }

    fn apply(&self, coeffs: &FilterCoefficients, zi: &[f64], signal: &[f64]) -> Vec<f64> {
        let padded = symmetric_pad_leading(signal, self.padlen);
        // Scale the state template by the first padded sample so the
        // response starts at the signal level rather than a discontinuity.
        let state: Vec<f64> = zi.iter().map(|v| v * padded[0]).collect();
        let (mut filtered, _) = lfilter(coeffs, &padded, &state);
        filtered.drain(..self.padlen);
        filtered
    }
}
