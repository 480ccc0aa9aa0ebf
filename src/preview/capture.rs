use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::compress::FrameEncoder;
use crate::camera::backend::FrameCallback;
use crate::camera::error::{CameraError, Result};
use crate::camera::types::NegotiatedFormat;
use crate::diagnostics::stats::DiagnosticStats;
use crate::dispatch::sink::FrameSink;

/// Which frame to discard when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropPolicy {
    /// Evict the oldest queued frame; the sink always sees the freshest image.
    #[default]
    DropOldest,
    /// Discard the incoming frame; queued frames are delivered in order.
    DropNewest,
}

/// What happened to a frame handed to [`FrameQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest frame.
    EvictedOldest,
    /// Not queued; the queue was full.
    Discarded,
    /// Not queued; the queue is closed.
    Closed,
}

struct QueueState {
    frames: VecDeque<Vec<u8>>,
    /// Buffers handed back by the consumer, reused for later frames.
    free: Vec<Vec<u8>>,
    closed: bool,
}

/// Bounded frame queue between the camera callback thread and the encoder.
///
/// Frames are copied into recycled buffers sized to the negotiated format,
/// so steady-state capture does not allocate.
pub struct FrameQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    capacity: usize,
    frame_len: usize,
    policy: DropPolicy,
    /// Monotonic count of frames accepted onto the queue.
    sequence: AtomicU64,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames of `frame_len` bytes.
    pub fn new(capacity: usize, frame_len: usize, policy: DropPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity),
                free: Vec::with_capacity(capacity + 1),
                closed: false,
            }),
            ready: Condvar::new(),
            capacity,
            frame_len,
            policy,
            sequence: AtomicU64::new(0),
        }
    }

    /// Copy `data` onto the queue, applying the drop policy when full.
    pub fn push(&self, data: &[u8]) -> PushOutcome {
        let mut state = self.state.lock();
        if state.closed {
            return PushOutcome::Closed;
        }

        let mut outcome = PushOutcome::Queued;
        if state.frames.len() >= self.capacity {
            match self.policy {
                DropPolicy::DropNewest => return PushOutcome::Discarded,
                DropPolicy::DropOldest => {
                    if let Some(old) = state.frames.pop_front() {
                        state.free.push(old);
                    }
                    outcome = PushOutcome::EvictedOldest;
                }
            }
        }

        let mut buf = state
            .free
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.frame_len));
        buf.clear();
        buf.extend_from_slice(data);
        state.frames.push_back(buf);
        self.sequence.fetch_add(1, Ordering::Relaxed);
        drop(state);

        self.ready.notify_one();
        outcome
    }

    /// Block until a frame is available. Returns `None` once the queue is
    /// closed; frames still queued at that point are discarded.
    pub fn pop(&self) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(frame) = state.frames.pop_front() {
                return Some(frame);
            }
            self.ready.wait(&mut state);
        }
    }

    /// Hand a consumed buffer back for reuse.
    pub fn recycle(&self, buf: Vec<u8>) {
        let mut state = self.state.lock();
        if state.free.len() <= self.capacity {
            state.free.push(buf);
        }
    }

    /// Close the queue and wake the consumer. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.frames.clear();
        drop(state);
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Number of frames ever accepted, including later evicted ones.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

/// Where encoded frames go and how they are encoded.
#[derive(Clone)]
pub struct DispatchTarget {
    pub sink: Arc<dyn FrameSink>,
    pub receiver: String,
    pub method: String,
    pub jpeg_quality: u8,
}

/// Frame queue plus the encoder thread draining it, for one session.
pub struct FramePipeline {
    queue: Arc<FrameQueue>,
    stats: Arc<Mutex<DiagnosticStats>>,
    worker: Option<JoinHandle<()>>,
}

impl FramePipeline {
    /// Allocate the queue for `format` and spawn the encoder thread.
    pub fn start(
        format: NegotiatedFormat,
        queue_capacity: usize,
        policy: DropPolicy,
        target: DispatchTarget,
        stats: Arc<Mutex<DiagnosticStats>>,
    ) -> Result<Self> {
        let queue = Arc::new(FrameQueue::new(queue_capacity, format.frame_len(), policy));

        let worker = {
            let queue = Arc::clone(&queue);
            let stats = Arc::clone(&stats);
            std::thread::Builder::new()
                .name(format!("frame-encoder-{}x{}", format.width, format.height))
                .spawn(move || Self::run_encoder(format, &queue, &stats, &target))
                .map_err(|e| CameraError::Stream(format!("failed to spawn encoder thread: {e}")))?
        };

        info!(
            width = format.width,
            height = format.height,
            frame_len = format.frame_len(),
            queue_capacity,
            ?policy,
            "frame pipeline started"
        );

        Ok(Self {
            queue,
            stats,
            worker: Some(worker),
        })
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }

    /// Callback to register on the device.
    ///
    /// Absent buffers and buffers whose length does not match the
    /// negotiated format are counted and dropped without reaching the sink.
    pub fn callback(&self) -> FrameCallback {
        let queue = Arc::clone(&self.queue);
        let stats = Arc::clone(&self.stats);
        Arc::new(move |data: Option<&[u8]>| {
            let Some(data) = data else {
                stats.lock().record_rejected();
                return;
            };
            if data.len() != queue.frame_len() {
                warn!(
                    got = data.len(),
                    expected = queue.frame_len(),
                    "frame size does not match negotiated format, dropping"
                );
                stats.lock().record_rejected();
                return;
            }

            match queue.push(data) {
                PushOutcome::Queued => stats.lock().record_received(),
                PushOutcome::EvictedOldest | PushOutcome::Discarded => {
                    let mut stats = stats.lock();
                    stats.record_received();
                    stats.record_drop();
                }
                PushOutcome::Closed => {}
            }
        })
    }

    fn run_encoder(
        format: NegotiatedFormat,
        queue: &FrameQueue,
        stats: &Mutex<DiagnosticStats>,
        target: &DispatchTarget,
    ) {
        let mut encoder = FrameEncoder::new(format, target.jpeg_quality);
        debug!("encoder thread running");
        while let Some(frame) = queue.pop() {
            let started = Instant::now();
            match encoder.encode(&frame) {
                Ok(payload) => {
                    target
                        .sink
                        .send_message(&target.receiver, &target.method, &payload);
                    stats
                        .lock()
                        .record_dispatch(payload.len(), started.elapsed().as_micros() as u64);
                }
                Err(e) => {
                    warn!("dropping frame: {e}");
                    stats.lock().record_encode_failure();
                }
            }
            queue.recycle(frame);
        }
        debug!("encoder thread exiting");
    }

    /// Close the queue and join the encoder. Idempotent.
    pub fn stop(&mut self) {
        self.queue.close();
        if let Some(handle) = self.worker.take() {
            if handle.thread().id() == std::thread::current().id() {
                // Stopped from inside the sink; the loop exits on its own
                return;
            }
            let _ = handle.join();
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
