use serde::Serialize;
use std::time::Instant;

/// Counters for one capture session's frame pipeline.
pub struct DiagnosticStats {
    received: u64,
    dispatched: u64,
    dropped: u64,
    rejected: u64,
    encode_failures: u64,
    total_bytes: u64,
    start_time: Instant,
    last_encode_us: u64,
}

/// Snapshot of diagnostic stats for serialisation to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSnapshot {
    pub fps: f64,
    pub frames_received: u64,
    pub frames_dispatched: u64,
    pub frames_dropped: u64,
    pub frames_rejected: u64,
    pub encode_failures: u64,
    pub drop_rate: f64,
    pub encode_ms: f64,
    pub bandwidth_bps: u64,
}

impl DiagnosticStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            received: 0,
            dispatched: 0,
            dropped: 0,
            rejected: 0,
            encode_failures: 0,
            total_bytes: 0,
            start_time: Instant::now(),
            last_encode_us: 0,
        }
    }

    /// A well-formed frame arrived from the device.
    pub fn record_received(&mut self) {
        self.received += 1;
    }

    /// A frame was encoded and handed to the sink.
    pub fn record_dispatch(&mut self, payload_bytes: usize, encode_us: u64) {
        self.dispatched += 1;
        self.total_bytes += payload_bytes as u64;
        self.last_encode_us = encode_us;
    }

    /// A queued frame was discarded under backpressure.
    pub fn record_drop(&mut self) {
        self.dropped += 1;
    }

    /// A frame arrived without a buffer or with the wrong length.
    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    pub fn record_encode_failure(&mut self) {
        self.encode_failures += 1;
    }

    /// Dispatched frames per second since the session started.
    pub fn fps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.dispatched as f64 / elapsed
    }

    /// Share of well-formed frames dropped by backpressure, as a percentage.
    pub fn drop_rate(&self) -> f64 {
        if self.received == 0 {
            return 0.0;
        }
        (self.dropped as f64 / self.received as f64) * 100.0
    }

    /// Duration of the most recent encode in milliseconds.
    pub fn encode_ms(&self) -> f64 {
        self.last_encode_us as f64 / 1000.0
    }

    /// Payload bytes per second handed to the sink.
    pub fn bandwidth_bps(&self) -> u64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0;
        }
        (self.total_bytes as f64 / elapsed) as u64
    }

    /// Reset all counters.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Take a serialisable snapshot.
    pub fn snapshot(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            fps: self.fps(),
            frames_received: self.received,
            frames_dispatched: self.dispatched,
            frames_dropped: self.dropped,
            frames_rejected: self.rejected,
            encode_failures: self.encode_failures,
            drop_rate: self.drop_rate(),
            encode_ms: self.encode_ms(),
            bandwidth_bps: self.bandwidth_bps(),
        }
    }
}

impl Default for DiagnosticStats {
    fn default() -> Self {
        Self::new()
    }
}
