//! Agent speech accumulation with gap-based flushing.
//!
//! Realtime transcription hands us agent speech in small fragments, often a few
//! words at a time. Fragments are joined until the agent pauses for longer than the
//! gap threshold or the user takes the turn; only then is the whole utterance worth
//! matching against the question list.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Buffer of agent fragments since the last flush.
#[derive(Debug, Clone)]
pub struct SpeechAccumulator {
    gap_threshold: Duration,
    text: String,
    last_update: Option<DateTime<Utc>>,
}

impl SpeechAccumulator {
    pub fn new(gap_threshold: Duration) -> Self {
        Self {
            gap_threshold,
            text: String::new(),
            last_update: None,
        }
    }

    /// True when the silence since the last fragment is strictly longer than the threshold.
    /// Always false before the first fragment.
    pub fn gap_exceeded(&self, now: DateTime<Utc>) -> bool {
        match self.last_update {
            Some(last) => match (now - last).to_std() {
                Ok(gap) => gap > self.gap_threshold,
                // Fragment stamped before the previous one: no gap.
                Err(_) => false,
            },
            None => false,
        }
    }

    /// Append a fragment, space-separated from what is already buffered.
    pub fn push(&mut self, fragment: &str, now: DateTime<Utc>) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
        self.last_update = Some(now);
    }

    /// Drain the buffer. `None` when nothing is pending.
    ///
    /// The last-update time is kept so a later fragment can still be measured
    /// against it.
    pub fn take(&mut self) -> Option<String> {
        if self.text.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.text))
        }
    }

    pub fn pending(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }
}
