//! Question matching by lexical overlap.
//!
//! The agent never tells us which question it is on, so buffered agent speech is
//! compared against the remaining questions. A question counts as asked when enough
//! of its meaningful (non-filler) words show up in the speech. The scan is greedy:
//! the first qualifying question at or after the cursor wins, not the best one.

use crate::config::MatcherConfig;
use crate::question::Question;
use std::collections::HashSet;
use tracing::{debug, info};

/// Stateless scorer over a fixed filler-word set and threshold.
#[derive(Debug, Clone)]
pub struct QuestionMatcher {
    threshold: f64,
    filler_words: HashSet<String>,
}

impl Default for QuestionMatcher {
    fn default() -> Self {
        Self::new(&MatcherConfig::default())
    }
}

impl QuestionMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            threshold: config.overlap_threshold,
            filler_words: config
                .filler_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
        }
    }

    /// Fraction of the question's meaningful words present in `spoken`.
    /// `None` when the question has no meaningful words to compare.
    pub fn overlap(&self, spoken: &HashSet<String>, question_text: &str) -> Option<f64> {
        let question_words = words(question_text);
        if question_words.is_empty() {
            return None;
        }
        let meaningful: HashSet<&String> = question_words
            .iter()
            .filter(|w| !self.filler_words.contains(*w))
            .collect();
        if meaningful.is_empty() {
            return None;
        }
        let common = meaningful.iter().filter(|w| spoken.contains(**w)).count();
        Some(common as f64 / meaningful.len() as f64)
    }

    /// First question index `>= from_index` whose overlap clears the threshold.
    pub fn match_question(
        &self,
        accumulated_text: &str,
        questions: &[Question],
        from_index: usize,
    ) -> Option<usize> {
        if from_index >= questions.len() {
            return None;
        }
        let spoken: HashSet<String> = words(accumulated_text)
            .into_iter()
            .filter(|w| !self.filler_words.contains(w))
            .collect();
        if spoken.is_empty() {
            return None;
        }

        for (idx, question) in questions.iter().enumerate().skip(from_index) {
            let Some(ratio) = self.overlap(&spoken, &question.text) else {
                continue;
            };
            if ratio >= self.threshold {
                info!("📊 Question match: {:.0}% overlap for Q{}", ratio * 100.0, idx + 1);
                return Some(idx);
            }
            debug!(question = idx + 1, overlap = ratio, "below match threshold");
        }

        None
    }
}

/// Lower-cased whitespace tokens.
fn words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Match with the default filler words and threshold.
pub fn match_question(accumulated_text: &str, questions: &[Question], from_index: usize) -> Option<usize> {
    QuestionMatcher::default().match_question(accumulated_text, questions, from_index)
}
