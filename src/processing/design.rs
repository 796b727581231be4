// src/processing/design.rs
//! Butterworth filter design in transfer-function form
//!
//! Coefficients are derived once at startup: analog Butterworth prototype,
//! lowpass-to-highpass or lowpass-to-bandstop transform, bilinear transform
//! with frequency pre-warping, then expansion from pole/zero form into
//! feedforward/feedback taps. All arithmetic runs in `f64`; poles and zeros
//! are tracked as `Complex64` until the final expansion.

use crate::error::{PipelineError, PipelineResult};
use num_complex::Complex64;

/// Feedforward (`b`) and feedback (`a`) taps of one designed filter,
/// normalized so `a[0] == 1`. Immutable after design.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    /// Feedforward taps.
    pub b: Vec<f64>,
    /// Feedback taps, `a[0] == 1`.
    pub a: Vec<f64>,
}

impl FilterCoefficients {
    /// Number of taps on the longer side; drives the pad-length formula.
    pub fn max_len(&self) -> usize {
        self.a.len().max(self.b.len())
    }

    /// Steady-state initial conditions for a unit-amplitude step.
    ///
    /// Scaled by the first input sample before filtering, this makes the
    /// filter output start at (or near) the signal level instead of ringing
    /// in from zero. Solves `(I - A^T) zi = B` over the companion form of
    /// the feedback taps.
    pub fn initial_state(&self) -> Vec<f64> {
        let n = self.max_len();
        if n < 2 {
            return Vec::new();
        }
        let (b, a) = padded_normalized(&self.b, &self.a);
        let m = n - 1;

        let mut matrix = vec![vec![0.0f64; m]; m];
        let mut rhs = vec![0.0f64; m];
        for i in 0..m {
            for j in 0..m {
                let mut v = if i == j { 1.0 } else { 0.0 };
                if j == 0 {
                    v = if i == 0 { 1.0 } else { 0.0 };
                    v += a[i + 1];
                }
                if j == i + 1 {
                    v -= 1.0;
                }
                matrix[i][j] = v;
            }
            rhs[i] = b[i + 1] - a[i + 1] * b[0];
        }
        solve_linear(matrix, rhs)
    }
}

/// Pad both tap vectors to equal length and normalize by `a[0]`.
pub(crate) fn padded_normalized(b: &[f64], a: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = a.len().max(b.len());
    let mut bp = b.to_vec();
    let mut ap = a.to_vec();
    bp.resize(n, 0.0);
    ap.resize(n, 0.0);
    let a0 = ap[0];
    for v in bp.iter_mut() {
        *v /= a0;
    }
    for v in ap.iter_mut() {
        *v /= a0;
    }
    (bp, ap)
}

/// Design a digital Butterworth high-pass filter.
pub fn butter_highpass(
    order: usize,
    cutoff_hz: f64,
    sample_rate_hz: f64,
) -> PipelineResult<FilterCoefficients> {
    validate_order(order)?;
    let wn = normalized_edge(cutoff_hz, sample_rate_hz, "high-pass cutoff")?;
    let warped = prewarp(wn);

    let poles = prototype_poles(order);
    let (z, p, k) = lowpass_to_highpass(&poles, warped);
    let (z, p, k) = bilinear(&z, &p, k);
    Ok(zpk_to_tf(&z, &p, k))
}

/// Design a digital Butterworth band-stop (notch band) filter.
///
/// The resulting filter has twice the requested order's pole count, as the
/// band transform doubles the degree.
pub fn butter_bandstop(
    order: usize,
    low_hz: f64,
    high_hz: f64,
    sample_rate_hz: f64,
) -> PipelineResult<FilterCoefficients> {
    validate_order(order)?;
    if low_hz >= high_hz {
        return Err(PipelineError::FilterDesign(format!(
            "band-stop edges inverted: {} Hz >= {} Hz",
            low_hz, high_hz
        )));
    }
    let w1 = prewarp(normalized_edge(low_hz, sample_rate_hz, "band-stop low edge")?);
    let w2 = prewarp(normalized_edge(high_hz, sample_rate_hz, "band-stop high edge")?);
    let bandwidth = w2 - w1;
    let center = (w1 * w2).sqrt();

    let poles = prototype_poles(order);
    let (z, p, k) = lowpass_to_bandstop(&poles, center, bandwidth);
    let (z, p, k) = bilinear(&z, &p, k);
    Ok(zpk_to_tf(&z, &p, k))
}

fn validate_order(order: usize) -> PipelineResult<()> {
    if order == 0 || order > 8 {
        return Err(PipelineError::FilterDesign(format!(
            "filter order must be 1-8, got {}",
            order
        )));
    }
    Ok(())
}

fn normalized_edge(freq_hz: f64, sample_rate_hz: f64, label: &str) -> PipelineResult<f64> {
    let nyquist = sample_rate_hz / 2.0;
    if freq_hz <= 0.0 || freq_hz >= nyquist {
        return Err(PipelineError::FilterDesign(format!(
            "{} {} Hz outside (0, {}) Hz",
            label, freq_hz, nyquist
        )));
    }
    Ok(freq_hz / nyquist)
}

// The bilinear transform below runs at an internal rate of 2 Hz, so edges
// are pre-warped as 2 * fs * tan(pi * wn / 2) with fs = 2.
const INTERNAL_FS: f64 = 2.0;

fn prewarp(wn: f64) -> f64 {
    2.0 * INTERNAL_FS * (std::f64::consts::PI * wn / 2.0).tan()
}

/// Poles of the analog Butterworth prototype (unit cutoff, gain 1).
fn prototype_poles(order: usize) -> Vec<Complex64> {
    let n = order as i64;
    (0..order)
        .map(|i| {
            let m = (-n + 1 + 2 * i as i64) as f64;
            let theta = std::f64::consts::PI * m / (2.0 * n as f64);
            -(Complex64::new(0.0, theta)).exp()
        })
        .collect()
}

fn product(values: impl Iterator<Item = Complex64>) -> Complex64 {
    values.fold(Complex64::new(1.0, 0.0), |acc, v| acc * v)
}

/// Lowpass prototype to highpass at analog frequency `wo`.
/// The prototype has no finite zeros, so the transform adds `order` zeros
/// at the origin.
fn lowpass_to_highpass(
    poles: &[Complex64],
    wo: f64,
) -> (Vec<Complex64>, Vec<Complex64>, f64) {
    let zeros = vec![Complex64::new(0.0, 0.0); poles.len()];
    let hp_poles: Vec<Complex64> = poles.iter().map(|&p| wo / p).collect();
    let gain = (Complex64::new(1.0, 0.0) / product(poles.iter().map(|&p| -p))).re;
    (zeros, hp_poles, gain)
}

/// Lowpass prototype to bandstop around analog center `wo`, width `bw`.
fn lowpass_to_bandstop(
    poles: &[Complex64],
    wo: f64,
    bw: f64,
) -> (Vec<Complex64>, Vec<Complex64>, f64) {
    let wo2 = Complex64::new(wo * wo, 0.0);
    let shifted: Vec<Complex64> = poles.iter().map(|&p| (bw / 2.0) / p).collect();

    let mut bs_poles = Vec::with_capacity(poles.len() * 2);
    for &p in &shifted {
        let root = (p * p - wo2).sqrt();
        bs_poles.push(p + root);
    }
    for &p in &shifted {
        let root = (p * p - wo2).sqrt();
        bs_poles.push(p - root);
    }

    // Degree-many conjugate zero pairs pinned to the center frequency.
    let mut bs_zeros = Vec::with_capacity(poles.len() * 2);
    bs_zeros.extend(std::iter::repeat(Complex64::new(0.0, wo)).take(poles.len()));
    bs_zeros.extend(std::iter::repeat(Complex64::new(0.0, -wo)).take(poles.len()));

    let gain = (Complex64::new(1.0, 0.0) / product(poles.iter().map(|&p| -p))).re;
    (bs_zeros, bs_poles, gain)
}

/// Analog to digital via the bilinear transform at the internal rate.
fn bilinear(
    zeros: &[Complex64],
    poles: &[Complex64],
    gain: f64,
) -> (Vec<Complex64>, Vec<Complex64>, f64) {
    let fs2 = Complex64::new(2.0 * INTERNAL_FS, 0.0);
    let degree = poles.len() - zeros.len();

    let mut z_digital: Vec<Complex64> = zeros.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
    let p_digital: Vec<Complex64> = poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    z_digital.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));

    let num = product(zeros.iter().map(|&z| fs2 - z));
    let den = product(poles.iter().map(|&p| fs2 - p));
    let k_digital = gain * (num / den).re;
    (z_digital, p_digital, k_digital)
}

/// Expand pole/zero form into tap vectors.
fn zpk_to_tf(zeros: &[Complex64], poles: &[Complex64], gain: f64) -> FilterCoefficients {
    let b = poly_from_roots(zeros)
        .into_iter()
        .map(|c| gain * c.re)
        .collect();
    let a = poly_from_roots(poles).into_iter().map(|c| c.re).collect();
    FilterCoefficients { b, a }
}

/// Monic polynomial coefficients (descending powers) from its roots.
fn poly_from_roots(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &root in roots {
        coeffs.push(Complex64::new(0.0, 0.0));
        for j in (1..coeffs.len()).rev() {
            let prev = coeffs[j - 1];
            coeffs[j] -= root * prev;
        }
    }
    coeffs
}

/// Gaussian elimination with partial pivoting; systems here are at most
/// (2 * order) square.
fn solve_linear(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Vec<f64> {
    let m = rhs.len();
    for col in 0..m {
        let pivot = (col..m)
            .max_by(|&r1, &r2| {
                matrix[r1][col]
                    .abs()
                    .total_cmp(&matrix[r2][col].abs())
            })
            .unwrap_or(col);
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..m {
            let factor = matrix[row][col] / matrix[col][col];
            for c in col..m {
                let upper = matrix[col][c];
                matrix[row][c] -= factor * upper;
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    let mut solution = vec![0.0f64; m];
    for row in (0..m).rev() {
        let mut sum = rhs[row];
        for c in row + 1..m {
            sum -= matrix[row][c] * solution[c];
        }
        solution[row] = sum / matrix[row][row];
    }
    solution
}

#[cfg(test)]
mod tests {
    use super::*;

    /// |H(f)| of the designed filter at one frequency.
    fn magnitude(coeffs: &FilterCoefficients, freq_hz: f64, sample_rate_hz: f64) -> f64 {
        let w = 2.0 * std::f64::consts::PI * freq_hz / sample_rate_hz;
        let z_inv = Complex64::new(0.0, -w).exp();
        let eval = |taps: &[f64]| {
            taps.iter()
                .enumerate()
                .map(|(i, &c)| Complex64::new(c, 0.0) * z_inv.powu(i as u32))
                .fold(Complex64::new(0.0, 0.0), |acc, v| acc + v)
        };
        (eval(&coeffs.b) / eval(&coeffs.a)).norm()
    }

    #[test]
    fn test_bandstop_response_shape() {
        let coeffs = butter_bandstop(3, 46.0, 54.0, 200.0).unwrap();
        assert_eq!(coeffs.b.len(), 7);
        assert_eq!(coeffs.a.len(), 7);
        assert!((coeffs.a[0] - 1.0).abs() < 1e-12);

        // Deep rejection at the mains frequency, flat elsewhere,
        // -3 dB at the band edges.
        assert!(magnitude(&coeffs, 50.0, 200.0) < 1e-6);
        assert!((magnitude(&coeffs, 46.0, 200.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((magnitude(&coeffs, 54.0, 200.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((magnitude(&coeffs, 0.0, 200.0) - 1.0).abs() < 1e-9);
        assert!((magnitude(&coeffs, 10.0, 200.0) - 1.0).abs() < 1e-6);
        assert!((magnitude(&coeffs, 90.0, 200.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bandstop_known_taps() {
        // Regression anchors for the default 46-54 Hz notch at 200 Hz.
        let coeffs = butter_bandstop(3, 46.0, 54.0, 200.0).unwrap();
        assert!((coeffs.b[0] - 7.772465214002e-1).abs() < 1e-9);
        assert!((coeffs.b[2] - 2.331739564201).abs() < 1e-9);
        assert!((coeffs.a[2] - 2.498608344691).abs() < 1e-9);
        assert!((coeffs.a[6] - 6.041096995073e-1).abs() < 1e-9);
        // Odd taps vanish for a symmetric band at fs/4.
        assert!(coeffs.b[1].abs() < 1e-12 && coeffs.b[3].abs() < 1e-12);
    }

    #[test]
    fn test_highpass_response_shape() {
        let coeffs = butter_highpass(3, 0.001, 200.0).unwrap();
        assert_eq!(coeffs.b.len(), 4);
        assert_eq!(coeffs.a.len(), 4);

        assert!((magnitude(&coeffs, 0.001, 200.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-2);
        assert!((magnitude(&coeffs, 1.0, 200.0) - 1.0).abs() < 1e-6);
        assert!((magnitude(&coeffs, 50.0, 200.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_highpass_steeper_cutoff() {
        // A less extreme edge where DC rejection is numerically clean.
        let coeffs = butter_highpass(3, 1.0, 200.0).unwrap();
        assert!(magnitude(&coeffs, 0.0, 200.0) < 1e-9);
        assert!((magnitude(&coeffs, 1.0, 200.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((magnitude(&coeffs, 20.0, 200.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_initial_state_passes_constant_through_bandstop() {
        let coeffs = butter_bandstop(3, 46.0, 54.0, 200.0).unwrap();
        let zi = coeffs.initial_state();
        assert_eq!(zi.len(), 6);

        // A constant sits in the passband: with scaled initial state the
        // output must hold the constant from the very first sample.
        let x0 = 2.5;
        let state: Vec<f64> = zi.iter().map(|v| v * x0).collect();
        let (y, _) = crate::processing::stage::lfilter(&coeffs, &[x0; 8], &state);
        for value in y {
            assert!((value - x0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_invalid_designs_rejected() {
        assert!(butter_highpass(0, 1.0, 200.0).is_err());
        assert!(butter_highpass(9, 1.0, 200.0).is_err());
        assert!(butter_highpass(3, 0.0, 200.0).is_err());
        assert!(butter_highpass(3, 100.0, 200.0).is_err());
        assert!(butter_bandstop(3, 54.0, 46.0, 200.0).is_err());
        assert!(butter_bandstop(3, 46.0, 150.0, 200.0).is_err());
    }
}
