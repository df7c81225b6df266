//! Outbound notifications to a remote viewer (transcript lines, progress updates).
//!
//! Delivery is best-effort. The tracker logs a failed `send` and moves on, so an
//! implementation is free to return errors without worrying about tracker state.

use crate::error::{ParleyError, ParleyResult};
use crate::transcript::Speaker;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Recipient identity for the notifier. Opaque to the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyTarget {
    pub recipient_id: String,
}

impl NotifyTarget {
    pub fn new(recipient_id: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
        }
    }

    /// Without a recipient there is nobody to notify.
    pub fn is_set(&self) -> bool {
        !self.recipient_id.trim().is_empty()
    }
}

/// Custom event payload sent to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundEvent {
    Transcript {
        speaker: Speaker,
        text: String,
        timestamp: f64,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        question_index: usize,
        category: String,
        total_questions: usize,
    },
}

impl OutboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundEvent::Transcript { .. } => "transcript",
            OutboundEvent::Progress { .. } => "progress",
        }
    }
}

/// Fire-and-forget sink for outbound events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: &NotifyTarget, event: &OutboundEvent) -> ParleyResult<()>;
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _target: &NotifyTarget, _event: &OutboundEvent) -> ParleyResult<()> {
        Ok(())
    }
}

/// Forwards events into an unbounded channel; the host drains the receiver.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<(NotifyTarget, OutboundEvent)>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(NotifyTarget, OutboundEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, target: &NotifyTarget, event: &OutboundEvent) -> ParleyResult<()> {
        self.tx
            .send((target.clone(), event.clone()))
            .map_err(|e| ParleyError::ChannelSend(e.to_string()))
    }
}
