use std::time::{Duration, Instant};

use crate::util::progress_percent;

/// Coarsens byte counts from one download into whole-percent updates.
///
/// An update passes only when the percentage has grown and `interval` has
/// elapsed since the previous one. The first update of a download and the
/// terminal 100% bypass the interval. Downloads with no expected size report
/// nothing.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    interval: Duration,
    expected: u64,
    last_percent: Option<u8>,
    last_emit: Option<Instant>,
}

impl ProgressReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            expected: 0,
            last_percent: None,
            last_emit: None,
        }
    }

    /// Reset for a new download of `expected` bytes.
    pub fn start(&mut self, expected: u64) {
        self.expected = expected;
        self.last_percent = None;
        self.last_emit = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.expected > 0
    }

    pub fn on_bytes(&mut self, bytes_so_far: u64) -> Option<u8> {
        self.on_bytes_at(bytes_so_far, Instant::now())
    }

    pub fn on_bytes_at(&mut self, bytes_so_far: u64, now: Instant) -> Option<u8> {
        let pct = progress_percent(bytes_so_far, self.expected)?;
        if let (Some(last_pct), Some(last_at)) = (self.last_percent, self.last_emit) {
            if pct <= last_pct || now.duration_since(last_at) < self.interval {
                return None;
            }
        }
        self.last_percent = Some(pct);
        self.last_emit = Some(now);
        Some(pct)
    }

    /// The closing 100% for a completed download, unless it was already sent.
    pub fn finish(&mut self) -> Option<u8> {
        if !self.is_enabled() || self.last_percent == Some(100) {
            return None;
        }
        self.last_percent = Some(100);
        self.last_emit = Some(Instant::now());
        Some(100)
    }
}
