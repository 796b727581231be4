// src/processing/mod.rs
//! Digital filtering: coefficient design and per-window application

pub mod design;
pub mod stage;

pub use design::{butter_bandstop, butter_highpass, FilterCoefficients};
pub use stage::{lfilter, symmetric_pad_leading, FilterStage};
