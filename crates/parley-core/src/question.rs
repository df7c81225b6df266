//! Expected questions, in the order the agent is meant to ask them.

use crate::error::{ParleyError, ParleyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One expected question/topic. Identity is its index in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub category: String,
}

impl Question {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
        }
    }
}

/// Ordered question list as stored on disk.
///
/// ```toml
/// [[questions]]
/// text = "Tell me about yourself"
/// category = "intro"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionPlan {
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuestionPlan {
    pub fn from_toml_str(s: &str) -> ParleyResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a plan from a `.toml` or `.json` file, chosen by extension.
    pub fn load(path: &Path) -> ParleyResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&raw)?),
            Some("toml") => Self::from_toml_str(&raw),
            other => Err(ParleyError::Config(format!(
                "unsupported question plan format {:?} ({})",
                other,
                path.display()
            ))),
        }
    }

    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }
}
