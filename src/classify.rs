// src/classify.rs
//! Directional-intent classification over the filtered window
//!
//! Two interchangeable policies, selected by configuration:
//!
//! - **Baseline band**: a median +/- k*stdev band recomputed every cycle,
//!   compared against the mean of the most recent quarter second. Fully
//!   reflects the current window; short decision horizon.
//! - **Adaptive extrema**: running observed minimum/maximum of a
//!   half-second median statistic. The extrema only ever widen during a
//!   run, so the policy grows progressively less sensitive over time; that
//!   is a characteristic of the design, not a defect, and is reproduced
//!   faithfully (no periodic reset).

use crate::config::{ClassifierConfig, PipelineConfig};
use tracing::debug;

/// Ternary control decision published once per completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum Decision {
    /// Turn left (-1 on the wire).
    Left = -1,
    /// Hold course (0 on the wire).
    Center = 0,
    /// Turn right (1 on the wire).
    Right = 1,
}

impl Decision {
    /// Wire form consumed by external actors: -1, 0, or 1.
    pub fn as_i8(self) -> i8 {
        self as i8
    }
}

impl From<Decision> for i8 {
    fn from(decision: Decision) -> i8 {
        decision.as_i8()
    }
}

/// Classifier with explicit owned state, passed by reference into each
/// cycle so the pipeline stays testable and reentrant.
pub struct Classifier {
    policy: PolicyState,
    sample_rate_hz: u32,
    trace_countdown: u32,
}

enum PolicyState {
    BaselineBand {
        spread_factor: f64,
    },
    AdaptiveExtrema {
        turn_threshold: f64,
        observed_min: f64,
        observed_max: f64,
    },
}

impl Classifier {
    /// Build the classifier selected by the configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let policy = match config.classifier {
            ClassifierConfig::BaselineBand { spread_factor } => {
                PolicyState::BaselineBand { spread_factor }
            }
            ClassifierConfig::AdaptiveExtrema { turn_threshold } => {
                PolicyState::AdaptiveExtrema {
                    turn_threshold,
                    observed_min: 0.0,
                    observed_max: 0.0,
                }
            }
        };
        Self {
            policy,
            sample_rate_hz: config.sample_rate_hz,
            trace_countdown: config.sample_rate_hz / 2,
        }
    }

    /// Observed extrema for the adaptive policy, `(min, max)`.
    /// Returns zeros for the baseline policy.
    pub fn observed_extrema(&self) -> (f64, f64) {
        match self.policy {
            PolicyState::AdaptiveExtrema {
                observed_min,
                observed_max,
                ..
            } => (observed_min, observed_max),
            PolicyState::BaselineBand { .. } => (0.0, 0.0),
        }
    }

    /// Derive one decision from the filtered window.
    pub fn classify(&mut self, filtered: &[f64]) -> Decision {
        let rate = self.sample_rate_hz as usize;
        match &mut self.policy {
            PolicyState::BaselineBand { spread_factor } => {
                let baseline = median(filtered);
                let spread = population_std(filtered);
                // A zero-variance window collapses both thresholds to the
                // baseline; the strict comparisons then yield Center.
                let left_threshold = baseline - *spread_factor * spread;
                let right_threshold = baseline + *spread_factor * spread;
                let recent = tail(filtered, rate / 4);
                let recent_mean = mean(recent);

                self.trace_countdown = self.trace_countdown.saturating_sub(1);
                if self.trace_countdown == 0 {
                    self.trace_countdown = self.sample_rate_hz / 2;
                    debug!(left_threshold, right_threshold, recent_mean, "baseline band");
                }

                if recent_mean > right_threshold {
                    Decision::Right
                } else if recent_mean < left_threshold {
                    Decision::Left
                } else {
                    Decision::Center
                }
            }
            PolicyState::AdaptiveExtrema {
                turn_threshold,
                observed_min,
                observed_max,
            } => {
                let stat = median(tail(filtered, rate / 2));
                *observed_min = observed_min.min(stat);
                *observed_max = observed_max.max(stat);

                self.trace_countdown = self.trace_countdown.saturating_sub(1);
                if self.trace_countdown == 0 {
                    self.trace_countdown = self.sample_rate_hz / 2;
                    debug!(
                        stat,
                        observed_min = *observed_min,
                        observed_max = *observed_max,
                        "adaptive extrema"
                    );
                }

                if stat > *turn_threshold * *observed_max {
                    Decision::Right
                } else if stat < *turn_threshold * *observed_min {
                    Decision::Left
                } else {
                    Decision::Center
                }
            }
        }
    }
}

/// Last `count` elements (the whole slice if shorter, never empty for a
/// non-empty slice).
fn tail(values: &[f64], count: usize) -> &[f64] {
    let count = count.clamp(1, values.len());
    &values[values.len() - count..]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median with even-length averaging.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|x, y| x.total_cmp(y));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Population standard deviation (divisor N, not N-1).
fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg) * (v - avg)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
