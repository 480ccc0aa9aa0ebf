use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Receiver, Sender};

/// One-way message endpoint on the host scripting side.
///
/// Mirrors a "send message to named object" call: no acknowledgement and no
/// return path.
pub trait FrameSink: Send + Sync {
    fn send_message(&self, receiver: &str, method: &str, payload: &str);
}

impl<F> FrameSink for F
where
    F: Fn(&str, &str, &str) + Send + Sync,
{
    fn send_message(&self, receiver: &str, method: &str, payload: &str) {
        self(receiver, method, payload)
    }
}

/// An owned copy of one dispatched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkMessage {
    pub receiver: String,
    pub method: String,
    pub payload: String,
}

/// Sink that forwards messages into a bounded tokio channel, for hosts that
/// consume frames from an async task. Full or closed channels drop the
/// message.
pub struct ChannelSink {
    tx: Sender<SinkMessage>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, Receiver<SinkMessage>) {
        let (tx, rx) = channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelSink {
    fn send_message(&self, receiver: &str, method: &str, payload: &str) {
        let message = SinkMessage {
            receiver: receiver.to_string(),
            method: method.to_string(),
            payload: payload.to_string(),
        };
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!(receiver, method, "sink channel full, message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(receiver, method, "sink channel closed, message dropped");
            }
        }
    }
}
