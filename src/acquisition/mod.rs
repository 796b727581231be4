// src/acquisition/mod.rs
//! Signal acquisition: datagram ingestion and rolling-window buffering

pub mod source;
pub mod window;

pub use source::{
    decode_sample, DecodeError, Sample, SampleSource, SourceError, UdpSampleSource,
    MAX_DATAGRAM_BYTES,
};
pub use window::RollingBuffer;
