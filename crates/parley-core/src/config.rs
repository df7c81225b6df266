//! Tracker configuration: heuristics thresholds and phrase lists.
//!
//! Every field has a default, so an empty TOML file (or none at all) yields the
//! stock tuning. `TrackerConfig::load` layers defaults < file < environment.

use crate::error::{ParleyError, ParleyResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_minimum_duration_minutes() -> f64 {
    8.0
}

fn default_wait_timeout_secs() -> u64 {
    900
}

fn default_accumulator_gap_secs() -> f64 {
    2.0
}

fn default_notify_timeout_secs() -> f64 {
    5.0
}

fn default_overlap_threshold() -> f64 {
    0.4
}

fn default_filler_words() -> Vec<String> {
    [
        "the", "a", "an", "is", "are", "was", "were", "to", "for", "and", "or", "in", "on", "at",
        "of", "your", "you", "me", "can", "could", "would", "about", "with",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_closing_phrases() -> Vec<String> {
    [
        "goodbye",
        "good bye",
        "bye",
        "luck",
        "best wishes",
        "thank you for your time",
        "thanks for sharing",
        "we'll be in touch",
        "be in touch",
        "that concludes",
        "wraps up",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_user_goodbye_words() -> Vec<String> {
    vec!["goodbye".to_string(), "bye".to_string()]
}

/// Lexical overlap matching parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Fraction of a question's meaningful words that must appear in agent speech (default 0.4).
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,
    /// Stop words removed from both sides before computing overlap.
    #[serde(default = "default_filler_words")]
    pub filler_words: Vec<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: default_overlap_threshold(),
            filler_words: default_filler_words(),
        }
    }
}

/// Tracker configuration.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | PARLEY__MINIMUM_DURATION_MINUTES | 8 | Duration that corroborates an agent closing phrase. |
/// | PARLEY__WAIT_TIMEOUT_SECS | 900 | Default `wait_for_completion` timeout. |
/// | PARLEY__ACCUMULATOR_GAP_SECS | 2.0 | Silence between agent fragments that flushes the buffer. |
/// | PARLEY__NOTIFY_TIMEOUT_SECS | 5.0 | Upper bound on a single notifier send. |
/// | PARLEY__MATCHER__OVERLAP_THRESHOLD | 0.4 | Question match threshold. |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_minimum_duration_minutes")]
    pub minimum_duration_minutes: f64,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_accumulator_gap_secs")]
    pub accumulator_gap_secs: f64,
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: f64,
    #[serde(default)]
    pub matcher: MatcherConfig,
    /// Agent phrases (case-insensitive substrings) that signal wrap-up.
    #[serde(default = "default_closing_phrases")]
    pub closing_phrases: Vec<String>,
    /// User words that end the conversation immediately.
    #[serde(default = "default_user_goodbye_words")]
    pub user_goodbye_words: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            minimum_duration_minutes: default_minimum_duration_minutes(),
            wait_timeout_secs: default_wait_timeout_secs(),
            accumulator_gap_secs: default_accumulator_gap_secs(),
            notify_timeout_secs: default_notify_timeout_secs(),
            matcher: MatcherConfig::default(),
            closing_phrases: default_closing_phrases(),
            user_goodbye_words: default_user_goodbye_words(),
        }
    }
}

impl TrackerConfig {
    /// Load config from file and environment. Precedence: env `PARLEY__*` > file named by
    /// `PARLEY_CONFIG` (default `config/parley`, extension optional) > defaults.
    pub fn load() -> ParleyResult<Self> {
        let config_path =
            std::env::var("PARLEY_CONFIG").unwrap_or_else(|_| "config/parley".to_string());
        let built = config::Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("PARLEY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: TrackerConfig = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document; missing keys fall back to defaults.
    pub fn from_toml_str(s: &str) -> ParleyResult<Self> {
        let cfg: TrackerConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject tunings that would make the heuristics meaningless.
    pub fn validate(&self) -> ParleyResult<()> {
        let t = self.matcher.overlap_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(ParleyError::Config(format!(
                "matcher.overlap_threshold must be in (0, 1], got {}",
                t
            )));
        }
        check_secs("accumulator_gap_secs", self.accumulator_gap_secs)?;
        check_secs("notify_timeout_secs", self.notify_timeout_secs)?;
        if !(self.minimum_duration_minutes.is_finite() && self.minimum_duration_minutes >= 0.0) {
            return Err(ParleyError::Config(format!(
                "minimum_duration_minutes must be a non-negative number, got {}",
                self.minimum_duration_minutes
            )));
        }
        Ok(())
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    /// Only meaningful on a validated config; out-of-range values saturate.
    pub fn accumulator_gap(&self) -> Duration {
        Duration::try_from_secs_f64(self.accumulator_gap_secs).unwrap_or(Duration::MAX)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.notify_timeout_secs).unwrap_or(Duration::MAX)
    }
}

/// A seconds value must be representable as a `Duration`.
fn check_secs(key: &str, secs: f64) -> ParleyResult<()> {
    Duration::try_from_secs_f64(secs).map(|_| ()).map_err(|_| {
        ParleyError::Config(format!(
            "{} must be a non-negative number of seconds, got {}",
            key, secs
        ))
    })
}
