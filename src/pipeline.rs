// src/pipeline.rs
//! Acquisition loop and decision publication
//!
//! The loop owns the whole receive -> buffer -> filter -> classify chain on
//! one dedicated thread; the blocking receive is its only suspension point.
//! The external consumer polls [`SharedDecision`] on its own cadence and
//! can never block the producer. There is no queue: the slot overwrites on
//! every completed cycle and the consumer sees the latest value only.

use crate::acquisition::{RollingBuffer, SampleSource, SourceError, UdpSampleSource};
use crate::classify::{Classifier, Decision};
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::processing::FilterStage;
use crossbeam::atomic::AtomicCell;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Single-slot, overwrite-on-write decision cell.
///
/// Sole writer is the acquisition loop; reads never observe a torn value
/// (the cell holds a one-byte tag and `AtomicCell` is lock-free for it).
pub struct SharedDecision {
    cell: AtomicCell<Decision>,
}

impl SharedDecision {
    /// New slot holding `Center`.
    pub fn new() -> Self {
        Self {
            cell: AtomicCell::new(Decision::Center),
        }
    }

    /// Overwrite the slot with the latest decision.
    pub fn publish(&self, decision: Decision) {
        self.cell.store(decision);
    }

    /// Read the most recently published decision.
    pub fn latest(&self) -> Decision {
        self.cell.load()
    }
}

impl Default for SharedDecision {
    fn default() -> Self {
        Self::new()
    }
}

/// Acquisition loop lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    /// Constructed, not yet running.
    Idle = 0,
    /// In the per-cycle loop (including the discard phase).
    Running = 1,
    /// Stop signaled; the in-flight cycle may still finish.
    Stopping = 2,
    /// Loop exited and the source is released.
    Stopped = 3,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Idle,
            1 => LoopState::Running,
            2 => LoopState::Stopping,
            _ => LoopState::Stopped,
        }
    }
}

/// Handle to a running acquisition loop.
pub struct AcquisitionHandle {
    stop_flag: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    wake_addr: SocketAddr,
    grace_period: Duration,
    thread: Option<JoinHandle<()>>,
}

impl AcquisitionHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Signal cooperative shutdown and block for the grace period.
    ///
    /// The stop flag is observed at cycle boundaries, not mid-receive, so a
    /// best-effort wake datagram nudges a receiver blocked on a silent
    /// source. Receive errors after the flag is set count as a clean stop.
    pub fn stop(mut self) {
        self.signal_stop();
        thread::sleep(self.grace_period);
        if let Some(handle) = self.thread.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // Grace period elapsed with the cycle still in flight; the
                // loop will exit on its next receive outcome.
                warn!("acquisition loop still busy after grace period");
            }
        }
    }

    fn signal_stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.state
            .store(LoopState::Stopping as u8, Ordering::Release);
        info!("stop signaled to acquisition loop");
        if let Ok(socket) = UdpSocket::bind("127.0.0.1:0") {
            let _ = socket.send_to(&[], self.wake_addr);
        }
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        // Signal without blocking if the caller never stopped explicitly.
        if self.thread.is_some() && self.state() == LoopState::Running {
            self.signal_stop();
        }
    }
}

/// Start the acquisition loop on its own thread.
///
/// The source must already be bound (bind failures are fatal and belong to
/// the caller's startup path). Filter design errors are also surfaced here,
/// before any thread is spawned.
pub fn start(
    config: &PipelineConfig,
    source: UdpSampleSource,
    decisions: Arc<SharedDecision>,
) -> PipelineResult<AcquisitionHandle> {
    config.validate()?;
    let stage = FilterStage::from_config(config)?;
    let buffer = RollingBuffer::new(config.window_len());
    let classifier = Classifier::from_config(config);

    let stop_flag = Arc::new(AtomicBool::new(false));
    let state = Arc::new(AtomicU8::new(LoopState::Idle as u8));
    let wake_addr = source.local_addr();
    let discard = config.discard_datagrams;

    let worker = LoopWorker {
        buffer,
        stage,
        classifier,
        target_channel: config.target_channel,
        decisions,
        stop_flag: Arc::clone(&stop_flag),
        state: Arc::clone(&state),
    };

    let thread = thread::Builder::new()
        .name("acquisition-loop".into())
        .spawn(move || worker.run(source, discard))
        .map_err(crate::error::PipelineError::Transport)?;

    Ok(AcquisitionHandle {
        stop_flag,
        state,
        wake_addr,
        grace_period: config.grace_period(),
        thread: Some(thread),
    })
}

/// Everything the loop thread owns.
struct LoopWorker {
    buffer: RollingBuffer,
    stage: FilterStage,
    classifier: Classifier,
    target_channel: usize,
    decisions: Arc<SharedDecision>,
    stop_flag: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl LoopWorker {
    fn run<S: SampleSource>(mut self, mut source: S, discard: usize) {
        self.state
            .store(LoopState::Running as u8, Ordering::Release);
        info!("acquisition loop running");

        if discard > 0 {
            if let Err(err) = self.discard_phase(&mut source, discard) {
                error!(%err, "backlog discard failed");
                self.state
                    .store(LoopState::Stopped as u8, Ordering::Release);
                return;
            }
        }

        // Stop flag is checked once per cycle boundary; there is no
        // mid-receive preemption and no receive timeout, so a silent
        // upstream stalls the loop here until woken.
        while !self.stop_flag.load(Ordering::Acquire) {
            match source.recv_sample() {
                Ok(sample) => {
                    self.buffer.append(sample.channel(self.target_channel));
                    let filtered = self.stage.process(&self.buffer.snapshot());
                    let decision = self.classifier.classify(&filtered);
                    self.decisions.publish(decision);
                }
                Err(SourceError::Decode(err)) => {
                    // Recoverable: skip this cycle without touching state.
                    debug!(%err, "skipped malformed datagram");
                }
                Err(SourceError::Io(err)) => {
                    if self.stop_flag.load(Ordering::Acquire) {
                        debug!(%err, "receive interrupted during shutdown");
                    } else {
                        error!(%err, "transport failure, stopping acquisition");
                    }
                    break;
                }
            }
        }

        // Releases the source before the state flips to Stopped.
        drop(source);
        self.state
            .store(LoopState::Stopped as u8, Ordering::Release);
        info!("acquisition loop stopped");
    }

    fn discard_phase<S: SampleSource>(
        &self,
        source: &mut S,
        discard: usize,
    ) -> Result<(), SourceError> {
        for _ in 0..discard {
            if self.stop_flag.load(Ordering::Acquire) {
                return Ok(());
            }
            match source.recv_sample() {
                // Backlog contents are irrelevant, malformed or not.
                Ok(_) | Err(SourceError::Decode(_)) => {}
                Err(err @ SourceError::Io(_)) => return Err(err),
            }
        }
        debug!(count = discard, "startup backlog discarded");
        Ok(())
    }
}
