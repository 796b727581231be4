// src/config.rs
//! Pipeline configuration structures
//!
//! The configuration surface is fixed at construction: network endpoint,
//! acquisition geometry (rate, channels, window), filter design parameters,
//! and classifier policy. There is no runtime reconfiguration.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Complete acquisition pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Local endpoint the datagram source binds to.
    pub endpoint: SocketAddr,
    /// Acquisition sample rate in Hz.
    pub sample_rate_hz: u32,
    /// Channels carried in each inbound datagram.
    pub num_channels: usize,
    /// Channel fed into the rolling window.
    pub target_channel: usize,
    /// Rolling window length in seconds.
    pub window_seconds: f64,
    /// Butterworth filter order for both cascade stages.
    pub filter_order: usize,
    /// Frequency bands for the two cascade stages.
    pub bands: FrequencyBands,
    /// Classifier policy and its threshold parameter.
    pub classifier: ClassifierConfig,
    /// Inbound datagrams dropped before steady state, to flush transport
    /// backlog accumulated before start. Tunable, not a correctness knob.
    pub discard_datagrams: usize,
    /// How long `stop()` blocks after signaling, letting the in-flight
    /// cycle finish before the source is assumed safe to finalize.
    pub grace_period_secs: f64,
}

/// Band edges in Hz for the two cascaded filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyBands {
    /// Band-stop range rejecting mains interference.
    pub line_noise: Band,
    /// Slow trend band; the high-pass stage uses its low edge.
    pub trend: Band,
}

/// A single frequency band, low edge first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Band {
    /// Lower band edge in Hz.
    pub low_hz: f64,
    /// Upper band edge in Hz.
    pub high_hz: f64,
}

/// Classifier policy selection.
///
/// Both policies appear in the evolution of this system and materially
/// change decision timing, so the choice is exposed rather than hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ClassifierConfig {
    /// Median +/- `spread_factor` * stdev band, recomputed every cycle.
    BaselineBand {
        /// Multiplier on the window standard deviation.
        spread_factor: f64,
    },
    /// Running-extrema thresholds that only ever widen during a run.
    AdaptiveExtrema {
        /// Fraction of the observed extremum a statistic must clear.
        turn_threshold: f64,
    },
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: SocketAddr::from(([127, 0, 0, 1], 12344)),
            sample_rate_hz: 200,
            num_channels: 2,
            target_channel: 0,
            window_seconds: 2.0,
            filter_order: 3,
            bands: FrequencyBands::default(),
            classifier: ClassifierConfig::default(),
            discard_datagrams: 500,
            grace_period_secs: 2.0,
        }
    }
}

impl Default for FrequencyBands {
    fn default() -> Self {
        Self {
            line_noise: Band { low_hz: 46.0, high_hz: 54.0 },
            trend: Band { low_hz: 0.001, high_hz: 6.0 },
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig::AdaptiveExtrema { turn_threshold: 0.5 }
    }
}

impl PipelineConfig {
    /// Window length in samples: `window_seconds * sample_rate_hz`.
    pub fn window_len(&self) -> usize {
        (self.window_seconds * self.sample_rate_hz as f64) as usize
    }

    /// Grace period as a [`Duration`].
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs_f64(self.grace_period_secs)
    }

    /// Nyquist frequency for the configured rate.
    pub fn nyquist_hz(&self) -> f64 {
        self.sample_rate_hz as f64 / 2.0
    }

    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> PipelineResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file and validate it.
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Config(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.sample_rate_hz == 0 {
            return Err(PipelineError::Config(
                "sample rate must be positive".into(),
            ));
        }
        if self.window_seconds <= 0.0 || self.window_len() == 0 {
            return Err(PipelineError::Config(
                "window length must span at least one sample".into(),
            ));
        }
        if self.num_channels == 0 {
            return Err(PipelineError::Config(
                "at least one channel is required".into(),
            ));
        }
        if self.target_channel >= self.num_channels {
            return Err(PipelineError::Config(format!(
                "target channel {} out of range for {} channels",
                self.target_channel, self.num_channels
            )));
        }
        if self.filter_order == 0 {
            return Err(PipelineError::Config("filter order must be >= 1".into()));
        }
        let nyquist = self.nyquist_hz();
        for (name, band) in [
            ("line_noise", &self.bands.line_noise),
            ("trend", &self.bands.trend),
        ] {
            if band.low_hz <= 0.0 || band.low_hz >= band.high_hz {
                return Err(PipelineError::Config(format!(
                    "{} band edges must satisfy 0 < low < high",
                    name
                )));
            }
            if band.high_hz >= nyquist {
                return Err(PipelineError::Config(format!(
                    "{} band upper edge {} Hz is at or above Nyquist ({} Hz)",
                    name, band.high_hz, nyquist
                )));
            }
        }
        match self.classifier {
            ClassifierConfig::BaselineBand { spread_factor } => {
                if spread_factor <= 0.0 {
                    return Err(PipelineError::Config(
                        "spread factor must be positive".into(),
                    ));
                }
            }
            ClassifierConfig::AdaptiveExtrema { turn_threshold } => {
                if turn_threshold <= 0.0 || turn_threshold > 1.0 {
                    return Err(PipelineError::Config(
                        "turn threshold must be in (0, 1]".into(),
                    ));
                }
            }
        }
        if self.grace_period_secs < 0.0 {
            return Err(PipelineError::Config(
                "grace period cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_len(), 400);
        assert_eq!(config.endpoint.port(), 12344);
    }

    #[test]
    fn test_invalid_target_channel() {
        let mut config = PipelineConfig::default();
        config.target_channel = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_band_edges() {
        let mut config = PipelineConfig::default();
        config.bands.line_noise = Band { low_hz: 54.0, high_hz: 46.0 };
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.bands.trend = Band { low_hz: 0.001, high_hz: 120.0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_thresholds() {
        let mut config = PipelineConfig::default();
        config.classifier = ClassifierConfig::AdaptiveExtrema { turn_threshold: 0.0 };
        assert!(config.validate().is_err());

        config.classifier = ClassifierConfig::BaselineBand { spread_factor: -1.0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PipelineConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed = PipelineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.sample_rate_hz, config.sample_rate_hz);
        assert_eq!(parsed.classifier, config.classifier);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = PipelineConfig::from_toml_str(
            "sample_rate_hz = 250\nwindow_seconds = 4.0\n",
        )
        .unwrap();
        assert_eq!(parsed.sample_rate_hz, 250);
        assert_eq!(parsed.window_len(), 1000);
        assert_eq!(parsed.num_channels, 2);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = PipelineConfig::from_toml_str("sample_rate_hz = \"fast\"").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
