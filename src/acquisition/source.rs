// src/acquisition/source.rs
//! Datagram ingestion and sample decoding
//!
//! One datagram carries one multi-channel sample as a JSON object with
//! numeric fields `"c1"`..`"cN"`. Extra fields are ignored. A payload that
//! fails to decode is a recoverable per-datagram event: the caller skips
//! that cycle without touching buffer state.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use std::net::{SocketAddr, UdpSocket};
use thiserror::Error;
use tracing::{debug, info};

/// Largest datagram payload accepted from the streamer.
pub const MAX_DATAGRAM_BYTES: usize = 1024;

/// One multi-channel reading captured at a single acquisition instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    channels: Vec<f64>,
}

impl Sample {
    /// Build a sample from per-channel readings, channel 0 first.
    pub fn new(channels: Vec<f64>) -> Self {
        Self { channels }
    }

    /// Reading for one channel.
    pub fn channel(&self, index: usize) -> f64 {
        self.channels[index]
    }

    /// Number of channels carried.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Recoverable decode failure for a single datagram.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was not parseable JSON.
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload parsed but is not a JSON object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// A required channel field was absent.
    #[error("channel field {0:?} missing from payload")]
    MissingChannel(String),

    /// A channel field was present but not a JSON number.
    #[error("channel field {0:?} is not numeric")]
    NonNumericChannel(String),
}

/// Failure from a single receive call.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Malformed datagram; skip this cycle and keep running.
    #[error("datagram decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Transport-level receive failure.
    #[error("receive failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that yields one sample per blocking receive.
///
/// The production implementation is [`UdpSampleSource`]; tests drive the
/// acquisition loop with scripted in-memory sources through this seam.
pub trait SampleSource {
    /// Block until one sample arrives or the transport fails.
    fn recv_sample(&mut self) -> Result<Sample, SourceError>;
}

/// Decode one datagram payload into a fixed-width sample.
///
/// Channel values are mapped by key: `"c1"` is channel 0 and so on through
/// the configured channel count. Keys beyond those are ignored.
pub fn decode_sample(payload: &[u8], num_channels: usize) -> Result<Sample, DecodeError> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let mut channels = Vec::with_capacity(num_channels);
    for index in 0..num_channels {
        let key = format!("c{}", index + 1);
        let field = object
            .get(&key)
            .ok_or_else(|| DecodeError::MissingChannel(key.clone()))?;
        let reading = field
            .as_f64()
            .ok_or(DecodeError::NonNumericChannel(key))?;
        channels.push(reading);
    }
    Ok(Sample::new(channels))
}

/// Connectionless datagram source bound to a fixed local endpoint.
#[derive(Debug)]
pub struct UdpSampleSource {
    socket: UdpSocket,
    local_addr: SocketAddr,
    num_channels: usize,
    recv_buf: Box<[u8; MAX_DATAGRAM_BYTES]>,
}

impl UdpSampleSource {
    /// Bind the source to the configured endpoint.
    ///
    /// A bind failure is fatal at startup and is not retried.
    pub fn bind(config: &PipelineConfig) -> PipelineResult<Self> {
        let socket = UdpSocket::bind(config.endpoint).map_err(|source| PipelineError::Bind {
            addr: config.endpoint,
            source,
        })?;
        let local_addr = socket.local_addr()?;
        info!(%local_addr, "sample source bound");
        Ok(Self {
            socket,
            local_addr,
            num_channels: config.num_channels,
            recv_buf: Box::new([0u8; MAX_DATAGRAM_BYTES]),
        })
    }

    /// The endpoint this source actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Drop `count` inbound datagrams without decoding them.
    ///
    /// Clears the jitter-buffer backlog accumulated between streamer start
    /// and pipeline start. Transport errors here are fatal: the pipeline has
    /// not entered steady state yet.
    pub fn discard_backlog(&mut self, count: usize) -> PipelineResult<()> {
        for _ in 0..count {
            self.socket.recv_from(self.recv_buf.as_mut_slice())?;
        }
        if count > 0 {
            debug!(count, "transport backlog discarded");
        }
        Ok(())
    }
}

impl SampleSource for UdpSampleSource {
    fn recv_sample(&mut self) -> Result<Sample, SourceError> {
        let (len, _peer) = self.socket.recv_from(self.recv_buf.as_mut_slice())?;
        let sample = decode_sample(&self.recv_buf[..len], self.num_channels)?;
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        // Ephemeral port so tests never collide.
        config.endpoint = "127.0.0.1:0".parse().unwrap();
        config
    }

    #[test]
    fn test_decode_valid_payload() {
        let sample = decode_sample(br#"{"c1": 1.5, "c2": -3.0}"#, 2).unwrap();
        assert_eq!(sample.channel(0), 1.5);
        assert_eq!(sample.channel(1), -3.0);
        assert_eq!(sample.channel_count(), 2);
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let sample =
            decode_sample(br#"{"c1": 1.0, "c2": 2.0, "seq": 7, "c3": 9.0}"#, 2).unwrap();
        assert_eq!(sample.channel_count(), 2);
        assert_eq!(sample.channel(1), 2.0);
    }

    #[test]
    fn test_decode_missing_channel() {
        let err = decode_sample(br#"{"c1": 1.0}"#, 2).unwrap_err();
        assert!(matches!(err, DecodeError::MissingChannel(key) if key == "c2"));
    }

    #[test]
    fn test_decode_non_numeric_channel() {
        let err = decode_sample(br#"{"c1": "5.0", "c2": 0.0}"#, 2).unwrap_err();
        assert!(matches!(err, DecodeError::NonNumericChannel(key) if key == "c1"));
    }

    #[test]
    fn test_decode_not_json() {
        assert!(matches!(
            decode_sample(b"not json", 2).unwrap_err(),
            DecodeError::Malformed(_)
        ));
        assert!(matches!(
            decode_sample(b"[1, 2]", 2).unwrap_err(),
            DecodeError::NotAnObject
        ));
        assert!(matches!(
            decode_sample(b"", 2).unwrap_err(),
            DecodeError::Malformed(_)
        ));
    }

    #[test]
    fn test_udp_receive_round_trip() {
        let mut source = UdpSampleSource::bind(&test_config()).unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(br#"{"c1": 4.25, "c2": 0.5}"#, source.local_addr())
            .unwrap();

        let sample = source.recv_sample().unwrap();
        assert_eq!(sample.channel(0), 4.25);
        assert_eq!(sample.channel(1), 0.5);
    }

    #[test]
    fn test_discard_backlog_consumes_datagrams() {
        let mut source = UdpSampleSource::bind(&test_config()).unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        for _ in 0..3 {
            sender.send_to(b"backlog", source.local_addr()).unwrap();
        }
        sender
            .send_to(br#"{"c1": 1.0, "c2": 2.0}"#, source.local_addr())
            .unwrap();

        source.discard_backlog(3).unwrap();
        let sample = source.recv_sample().unwrap();
        assert_eq!(sample.channel(0), 1.0);
    }

    #[test]
    fn test_bind_conflict_is_fatal() {
        let source = UdpSampleSource::bind(&test_config()).unwrap();
        let mut conflicting = PipelineConfig::default();
        conflicting.endpoint = source.local_addr();
        let err = UdpSampleSource::bind(&conflicting).unwrap_err();
        assert!(matches!(err, PipelineError::Bind { .. }));
    }
}
