//! Append-only transcript of the conversation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    User,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Agent => "agent",
            Speaker::User => "user",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single transcript entry. `timestamp` is seconds since conversation start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: f64,
}

/// Ordered log of entries in arrival order. Never reordered or truncated.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Filtering empty text is the caller's job.
    pub fn append(&mut self, speaker: Speaker, text: impl Into<String>, timestamp: f64) {
        self.entries.push(TranscriptEntry {
            speaker,
            text: text.into(),
            timestamp,
        });
    }

    /// Owned copy of every entry so far.
    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.clone()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render entries as a JSON array of `{speaker, text, timestamp}` records.
pub fn transcript_to_json(entries: &[TranscriptEntry]) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_arrival_order() {
        let mut t = Transcript::new();
        t.append(Speaker::Agent, "Hello there", 1.5);
        t.append(Speaker::User, "Hi", 0.9);
        t.append(Speaker::Agent, "Let's begin", 3.0);

        let snap = t.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].text, "Hello there");
        assert_eq!(snap[1].speaker, Speaker::User);
        assert_eq!(snap[1].timestamp, 0.9);
        assert_eq!(snap[2].text, "Let's begin");
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut t = Transcript::new();
        t.append(Speaker::Agent, "one", 0.0);
        let snap = t.snapshot();
        t.append(Speaker::Agent, "two", 1.0);
        assert_eq!(snap.len(), 1);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_json_shape() {
        let mut t = Transcript::new();
        t.append(Speaker::User, "Sounds good", 12.34);
        let json = transcript_to_json(t.entries()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "speaker": "user", "text": "Sounds good", "timestamp": 12.34 }])
        );
    }
}
