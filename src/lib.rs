//! neuri-core: real-time EEG acquisition and directional-intent
//! classification for BCI control
//!
//! The pipeline ingests a live biosignal stream over UDP, maintains a
//! rolling window over one channel, removes line noise and drift with two
//! cascaded Butterworth filters, classifies the recent trend into a
//! ternary control decision, and publishes the latest decision through a
//! single-slot cell polled by an external consumer.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use neuri_core::{start, PipelineConfig, SharedDecision, UdpSampleSource};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let source = UdpSampleSource::bind(&config)?;
//!     let decisions = Arc::new(SharedDecision::new());
//!
//!     let handle = start(&config, source, Arc::clone(&decisions))?;
//!
//!     // The consumer polls on its own cadence; -1 left, 0 center, 1 right.
//!     let direction = decisions.latest().as_i8();
//!     println!("direction: {}", direction);
//!
//!     handle.stop();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acquisition;
pub mod classify;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod processing;

pub use acquisition::{RollingBuffer, Sample, SampleSource, UdpSampleSource};
pub use classify::{Classifier, Decision};
pub use config::{Band, ClassifierConfig, FrequencyBands, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{start, AcquisitionHandle, LoopState, SharedDecision};
pub use processing::{butter_bandstop, butter_highpass, FilterCoefficients, FilterStage};
