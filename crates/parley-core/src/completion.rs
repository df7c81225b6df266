//! Completion heuristics: closing-phrase detection and the done/not-done decision.
//!
//! A closing phrase on its own is weak evidence (it can be quoted, or said
//! mid-sentence), so the agent path only completes when the phrase is
//! corroborated by question progress or elapsed time. A user goodbye is taken
//! at face value.

use crate::config::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Why the conversation was marked complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionReason {
    /// Agent closing phrase, corroborated by progress and/or duration.
    AgentClosing {
        questions_asked: usize,
        duration_minutes: f64,
        enough_questions: bool,
        enough_time: bool,
    },
    /// The user said goodbye.
    UserGoodbye { utterance: String },
    /// Nobody ended the conversation before the wait timed out.
    Timeout { after_minutes: f64 },
}

impl CompletionReason {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CompletionReason::Timeout { .. })
    }
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionReason::AgentClosing {
                questions_asked,
                duration_minutes,
                enough_questions,
                enough_time,
            } => {
                write!(f, "agent said goodbye")?;
                if *enough_questions {
                    write!(f, ", asked {} questions", questions_asked)?;
                }
                if *enough_time {
                    write!(f, ", {:.1} min duration", duration_minutes)?;
                }
                Ok(())
            }
            CompletionReason::UserGoodbye { .. } => write!(f, "User said goodbye"),
            CompletionReason::Timeout { after_minutes } => {
                write!(f, "timeout after {:.1} minutes", after_minutes)
            }
        }
    }
}

/// Snapshot of the counters the evaluator looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionInputs {
    pub closing_phrases: usize,
    pub questions_asked: usize,
    pub expected_questions: usize,
    pub duration_minutes: f64,
}

/// Outcome of one evaluation, with the individual signals for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionDecision {
    pub has_closing_phrase: bool,
    pub enough_questions: bool,
    pub enough_time: bool,
    pub reason: Option<CompletionReason>,
}

impl CompletionDecision {
    pub fn is_complete(&self) -> bool {
        self.reason.is_some()
    }
}

/// Stateless evaluator over the conversation counters.
#[derive(Debug, Clone)]
pub struct CompletionEvaluator {
    minimum_duration_minutes: f64,
}

impl CompletionEvaluator {
    pub fn new(minimum_duration_minutes: f64) -> Self {
        Self {
            minimum_duration_minutes,
        }
    }

    /// Complete iff a closing phrase was seen and either all but one question were
    /// asked or the minimum duration has passed.
    pub fn evaluate(&self, inputs: &CompletionInputs) -> CompletionDecision {
        let has_closing_phrase = inputs.closing_phrases > 0;
        let enough_questions =
            inputs.questions_asked >= inputs.expected_questions.saturating_sub(1);
        let enough_time = inputs.duration_minutes >= self.minimum_duration_minutes;

        info!(
            closing_phrases = inputs.closing_phrases,
            questions_asked = inputs.questions_asked,
            expected_questions = inputs.expected_questions,
            duration_minutes = inputs.duration_minutes,
            minimum_minutes = self.minimum_duration_minutes,
            has_closing_phrase,
            enough_questions,
            enough_time,
            "📊 Completion check"
        );

        let reason = if has_closing_phrase && (enough_questions || enough_time) {
            Some(CompletionReason::AgentClosing {
                questions_asked: inputs.questions_asked,
                duration_minutes: inputs.duration_minutes,
                enough_questions,
                enough_time,
            })
        } else {
            debug!("⏳ Not complete yet - continuing conversation");
            None
        };

        CompletionDecision {
            has_closing_phrase,
            enough_questions,
            enough_time,
            reason,
        }
    }
}

/// Case-insensitive substring detection of wrap-up cues.
#[derive(Debug, Clone)]
pub struct ClosingDetector {
    agent_phrases: Vec<String>,
    user_goodbyes: Vec<String>,
}

impl Default for ClosingDetector {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

impl ClosingDetector {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            agent_phrases: lowercase_all(&config.closing_phrases),
            user_goodbyes: lowercase_all(&config.user_goodbye_words),
        }
    }

    /// First configured closing phrase found in an agent utterance.
    pub fn agent_closing<'a>(&'a self, text: &str) -> Option<&'a str> {
        let lower = text.to_lowercase();
        self.agent_phrases
            .iter()
            .find(|p| lower.contains(p.as_str()))
            .map(String::as_str)
    }

    /// True when a user utterance says goodbye.
    pub fn user_goodbye(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.user_goodbyes.iter().any(|w| lower.contains(w.as_str()))
    }
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
