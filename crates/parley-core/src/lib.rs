//! # Parley Core - conversation progress and completion detection
//!
//! Follows a live, transcribed conversation between an agent and a user against an
//! ordered list of expected questions. From fragmented speech alone it infers which
//! question the agent is on, keeps a timestamped transcript, and decides the single
//! moment the conversation is done.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Conversation Tracker                       │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Speech Event │→ │ Accumulator  │→ │   Matcher    │       │
//! │  │  (host bus)  │  │  (2s gap)    │  │ (40% overlap)│       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │         ↓                                    ↓               │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │  Transcript  │  │  Evaluator   │→ │    Latch     │       │
//! │  │  + Notifier  │  │ (closing+…)  │  │ (one-shot)   │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod accumulator;
pub mod completion;
pub mod config;
pub mod error;
pub mod events;
pub mod matcher;
pub mod notify;
pub mod question;
pub mod tracker;
pub mod transcript;

pub use accumulator::SpeechAccumulator;
pub use completion::{
    ClosingDetector, CompletionDecision, CompletionEvaluator, CompletionInputs, CompletionReason,
};
pub use crate::config::{MatcherConfig, TrackerConfig};
pub use error::{ParleyError, ParleyResult};
pub use events::{ConversationEvent, EventRegistry, SpeechFragment};
pub use matcher::{match_question, QuestionMatcher};
pub use notify::{ChannelNotifier, NoopNotifier, Notifier, NotifyTarget, OutboundEvent};
pub use question::{Question, QuestionPlan};
pub use tracker::{ConversationTracker, ConversationTrackerBuilder, OnComplete, ProgressSnapshot};
pub use transcript::{transcript_to_json, Speaker, Transcript, TranscriptEntry};
