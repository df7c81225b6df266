//! Inbound speech events and the registry a host bus uses to decode them.
//!
//! Hosts deliver raw JSON tagged on `"type"`. The two speech kinds decode into
//! [`ConversationEvent`]; kinds that were declared ignorable (opaque custom
//! signals the viewer bounces back, for instance) decode to `None` quietly; anything
//! else is an [`ParleyError::UnknownEvent`] for the host to log.

use crate::error::{ParleyError, ParleyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

pub const AGENT_SPEECH_KIND: &str = "agent_speech";
pub const USER_SPEECH_KIND: &str = "user_speech";
pub const CUSTOM_KIND: &str = "custom";

/// A transcription fragment. `emitted_at` defaults to receipt time when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechFragment {
    pub text: String,
    #[serde(default = "Utc::now")]
    pub emitted_at: DateTime<Utc>,
}

impl SpeechFragment {
    pub fn new(text: impl Into<String>, emitted_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            emitted_at,
        }
    }
}

/// Events the tracker understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    AgentSpeech(SpeechFragment),
    UserSpeech(SpeechFragment),
    /// Opaque custom signal; carried so hosts can route it, never acted on.
    Custom {
        #[serde(default)]
        custom: serde_json::Value,
    },
}

impl ConversationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ConversationEvent::AgentSpeech(_) => AGENT_SPEECH_KIND,
            ConversationEvent::UserSpeech(_) => USER_SPEECH_KIND,
            ConversationEvent::Custom { .. } => CUSTOM_KIND,
        }
    }
}

/// Tag registry for a host event bus.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    ignorable: HashSet<String>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a kind that must be accepted and dropped without error.
    pub fn declare_ignorable(&mut self, kind: impl Into<String>) {
        self.ignorable.insert(kind.into());
    }

    pub fn is_ignorable(&self, kind: &str) -> bool {
        self.ignorable.contains(kind)
    }

    /// Decode one raw event. `Ok(None)` means "declared ignorable, nothing to do".
    pub fn decode(&self, raw: &serde_json::Value) -> ParleyResult<Option<ConversationEvent>> {
        let kind = raw
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ParleyError::MalformedEvent("missing \"type\" tag".to_string()))?;

        match kind {
            AGENT_SPEECH_KIND | USER_SPEECH_KIND => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|e| ParleyError::MalformedEvent(format!("{}: {}", kind, e))),
            k if self.is_ignorable(k) => {
                debug!(kind = k, "ignoring declared custom event");
                Ok(None)
            }
            other => Err(ParleyError::UnknownEvent(other.to_string())),
        }
    }

    /// Decode one JSON line as delivered by a line-oriented transport.
    pub fn decode_line(&self, line: &str) -> ParleyResult<Option<ConversationEvent>> {
        let raw: serde_json::Value = serde_json::from_str(line)?;
        self.decode(&raw)
    }
}
