// src/error.rs
//! Error types shared across the acquisition pipeline
//!
//! Fatal conditions (bind failures, invalid configuration, impossible filter
//! designs) surface as [`PipelineError`] to the caller that owns startup.
//! Recoverable per-datagram decode failures are deliberately not part of this
//! enum; they live at the source seam as [`crate::acquisition::DecodeError`]
//! and never abort the loop.

use std::net::SocketAddr;
use thiserror::Error;

/// Fatal pipeline errors, surfaced to the orchestrating caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration detected before the loop starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// The sample source could not be bound. Fatal at startup, no retry.
    #[error("failed to bind sample source at {addr}: {source}")]
    Bind {
        /// Requested local endpoint.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Transport failure outside the startup path.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The requested filter could not be designed.
    #[error("filter design error: {0}")]
    FilterDesign(String),
}

/// Result alias used throughout the crate.
pub type PipelineResult<T> = Result<T, PipelineError>;
