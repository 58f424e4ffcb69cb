//! Download progress accounting.

use std::time::{Duration, Instant};

/// Declared sizes above this produce progress observations.
pub const DEFAULT_PROGRESS_THRESHOLD: u64 = 1024 * 1024;

/// Running totals for one streamed download.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    expected: u64,
    transferred: u64,
    started: Instant,
    threshold: u64,
}

/// One progress sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressObservation {
    pub transferred: u64,
    pub expected: u64,
    pub percent: f64,
    pub bytes_per_sec: f64,
}

impl DownloadProgress {
    /// `expected` is the upstream content-length, 0 when absent.
    pub fn new(expected: u64, threshold: u64) -> Self {
        Self::starting_at(expected, threshold, Instant::now())
    }

    pub fn starting_at(expected: u64, threshold: u64, started: Instant) -> Self {
        Self {
            expected,
            transferred: 0,
            started,
            threshold,
        }
    }

    /// Account for a chunk. Returns an observation when the download is large
    /// enough to report on.
    pub fn record(&mut self, chunk_len: usize) -> Option<ProgressObservation> {
        self.record_at(chunk_len, Instant::now())
    }

    pub fn record_at(&mut self, chunk_len: usize, now: Instant) -> Option<ProgressObservation> {
        self.transferred += chunk_len as u64;
        if self.expected <= self.threshold {
            return None;
        }
        let elapsed = now.duration_since(self.started).as_secs_f64().max(0.001);
        Some(ProgressObservation {
            transferred: self.transferred,
            expected: self.expected,
            percent: (self.transferred as f64 / self.expected as f64) * 100.0,
            bytes_per_sec: self.transferred as f64 / elapsed,
        })
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
