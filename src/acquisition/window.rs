// src/acquisition/window.rs
//! Fixed-length rolling window over one channel's samples

use std::collections::VecDeque;

/// A constant-length sliding window with strict FIFO eviction.
///
/// The window is pre-filled with zeros, so its length is `N` from the very
/// first cycle; early filtered output over the zero prefill is a valid but
/// uninformative startup transient. Owned exclusively by the acquisition
/// loop, never shared across threads.
pub struct RollingBuffer {
    samples: VecDeque<f64>,
    len: usize,
}

impl RollingBuffer {
    /// Create a window of `len` samples, initialized to all zeros.
    ///
    /// # Panics
    /// Panics if `len` is zero; [`crate::config::PipelineConfig::validate`]
    /// rejects such configurations before construction.
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "rolling window must hold at least one sample");
        let mut samples = VecDeque::with_capacity(len + 1);
        samples.resize(len, 0.0);
        Self { samples, len }
    }

    /// Append one scalar, evicting exactly the oldest. O(1) amortized.
    pub fn append(&mut self, value: f64) {
        self.samples.pop_front();
        self.samples.push_back(value);
        debug_assert_eq!(self.samples.len(), self.len);
    }

    /// Current window contents, oldest first.
    ///
    /// Returns an owned copy so the filter stage can never mutate the
    /// window through its input.
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    /// Window length; constant for the lifetime of the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: the window is zero-filled at construction.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
