//! Conversation tracker - the event-driven controller
//!
//! Ties the accumulator, matcher and completion evaluator together behind two
//! handlers (`on_agent_speech`, `on_user_speech`) that a host wires to its speech
//! event bus, and exposes a completion latch that any number of tasks can await.
//!
//! ```text
//! agent fragment ──► gap? flush ──► transcript + notify ──► accumulate ──► closing? ──► evaluate
//! user fragment  ──► flush ──► transcript + notify ──► goodbye? ──► complete
//!                       │
//!                       └─► matcher ──► cursor advance ──► progress notify
//! ```

use crate::accumulator::SpeechAccumulator;
use crate::completion::{ClosingDetector, CompletionEvaluator, CompletionInputs, CompletionReason};
use crate::config::TrackerConfig;
use crate::error::ParleyResult;
use crate::events::{ConversationEvent, EventRegistry, SpeechFragment, CUSTOM_KIND};
use crate::matcher::QuestionMatcher;
use crate::notify::{NoopNotifier, Notifier, NotifyTarget, OutboundEvent};
use crate::question::Question;
use crate::transcript::{Speaker, Transcript, TranscriptEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Zero-argument callback fired once when the conversation completes.
pub type OnComplete = Arc<dyn Fn() + Send + Sync>;

/// Point-in-time view of the progress counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub current_question_index: usize,
    pub questions_asked: usize,
    pub total_questions: usize,
    pub closing_phrases: Vec<String>,
    /// Minutes from the start to the latest event handled, on the events' own clock
    /// (the same clock completion is judged on). Zero before the first event.
    pub duration_minutes: f64,
    pub complete: bool,
}

/// Mutable state, only touched with the event lock held.
#[derive(Debug)]
struct ConversationState {
    current_question_index: usize,
    questions_asked: usize,
    closing_phrases_seen: Vec<String>,
    last_agent_speech_at: Option<DateTime<Utc>>,
    last_event_at: Option<DateTime<Utc>>,
    accumulator: SpeechAccumulator,
}

/// Tracks which expected question the agent is on and decides when the conversation is over.
pub struct ConversationTracker {
    questions: Vec<Question>,
    config: TrackerConfig,
    matcher: QuestionMatcher,
    evaluator: CompletionEvaluator,
    detector: ClosingDetector,
    notifier: Arc<dyn Notifier>,
    target: NotifyTarget,
    on_complete: Option<OnComplete>,
    started_at: DateTime<Utc>,

    // Serializes event handling; held across notifier awaits.
    state: Mutex<ConversationState>,
    // Kept outside the event lock so snapshots never wait on a slow notifier.
    transcript: RwLock<Transcript>,
    completion: watch::Sender<Option<CompletionReason>>,
}

/// Builder for [`ConversationTracker`].
pub struct ConversationTrackerBuilder {
    questions: Vec<Question>,
    config: TrackerConfig,
    notifier: Option<Arc<dyn Notifier>>,
    target: NotifyTarget,
    on_complete: Option<OnComplete>,
    started_at: Option<DateTime<Utc>>,
}

impl ConversationTrackerBuilder {
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn target(mut self, target: NotifyTarget) -> Self {
        self.target = target;
        self
    }

    pub fn on_complete(mut self, callback: OnComplete) -> Self {
        self.on_complete = Some(callback);
        self
    }

    /// Override the conversation start (defaults to build time).
    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn build(self) -> ParleyResult<ConversationTracker> {
        self.config.validate()?;

        let started_at = self.started_at.unwrap_or_else(Utc::now);
        let (completion, _) = watch::channel(None);

        info!(
            questions = self.questions.len(),
            minimum_minutes = self.config.minimum_duration_minutes,
            "🎬 Conversation tracker initialized"
        );

        Ok(ConversationTracker {
            matcher: QuestionMatcher::new(&self.config.matcher),
            evaluator: CompletionEvaluator::new(self.config.minimum_duration_minutes),
            detector: ClosingDetector::from_config(&self.config),
            state: Mutex::new(ConversationState {
                current_question_index: 0,
                questions_asked: 0,
                closing_phrases_seen: Vec::new(),
                last_agent_speech_at: None,
                last_event_at: None,
                accumulator: SpeechAccumulator::new(self.config.accumulator_gap()),
            }),
            transcript: RwLock::new(Transcript::new()),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier)),
            questions: self.questions,
            config: self.config,
            target: self.target,
            on_complete: self.on_complete,
            started_at,
            completion,
        })
    }
}

impl ConversationTracker {
    pub fn builder(questions: Vec<Question>) -> ConversationTrackerBuilder {
        ConversationTrackerBuilder {
            questions,
            config: TrackerConfig::default(),
            notifier: None,
            target: NotifyTarget::default(),
            on_complete: None,
            started_at: None,
        }
    }

    /// Declare the custom event kind the viewer echoes back, so the host bus drops it quietly.
    pub fn register_events(&self, registry: &mut EventRegistry) {
        registry.declare_ignorable(CUSTOM_KIND);
    }

    /// Route a decoded event to its handler.
    pub async fn dispatch(&self, event: ConversationEvent) {
        match event {
            ConversationEvent::AgentSpeech(fragment) => self.on_agent_speech(fragment).await,
            ConversationEvent::UserSpeech(fragment) => self.on_user_speech(fragment).await,
            ConversationEvent::Custom { .. } => debug!("custom event ignored"),
        }
    }

    /// Handle an agent transcription fragment.
    pub async fn on_agent_speech(&self, fragment: SpeechFragment) {
        let now = fragment.emitted_at;
        let text = fragment.text.trim();

        let mut state = self.state.lock().await;
        state.last_event_at = state.last_event_at.max(Some(now));

        // A pause means the previous utterance is finished; match it before starting a new one.
        if state.accumulator.gap_exceeded(now) {
            self.flush_accumulator(&mut state).await;
        }

        if !text.is_empty() {
            self.record(Speaker::Agent, text, now).await;
            state.accumulator.push(text, now);
        }
        state.last_agent_speech_at = Some(now);

        let Some(phrase) = self.detector.agent_closing(text) else {
            return;
        };
        info!(phrase, "👋 Agent used closing phrase: '{}'", text);
        state.closing_phrases_seen.push(text.to_string());

        // Wrap-up implies the final section was reached, whatever the matcher saw.
        let total = self.questions.len();
        if state.current_question_index < total {
            let last_idx = total - 1;
            state.current_question_index = total;
            info!("📊 Marked wrap-up complete (Q{})", last_idx + 1);
            self.send_progress(last_idx).await;
        }

        let decision = self.evaluator.evaluate(&CompletionInputs {
            closing_phrases: state.closing_phrases_seen.len(),
            questions_asked: state.questions_asked,
            expected_questions: total,
            duration_minutes: self.minutes_at(now),
        });
        if let Some(reason) = decision.reason {
            self.mark_complete(reason);
        }
    }

    /// Handle a user transcription fragment. A user turn always flushes pending agent speech.
    pub async fn on_user_speech(&self, fragment: SpeechFragment) {
        let mut state = self.state.lock().await;
        state.last_event_at = state.last_event_at.max(Some(fragment.emitted_at));
        self.flush_accumulator(&mut state).await;

        let text = fragment.text.trim();

        // Realtime models often emit bare punctuation for user turns.
        if text.chars().count() > 1 {
            self.record(Speaker::User, text, fragment.emitted_at).await;
        }

        if self.detector.user_goodbye(text) {
            info!("👋 User said goodbye: '{}'", text);
            self.mark_complete(CompletionReason::UserGoodbye {
                utterance: text.to_string(),
            });
        }
    }

    /// Set the latch. Only the first call wins; returns whether this call did.
    pub fn mark_complete(&self, reason: CompletionReason) -> bool {
        let won = self.completion.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason.clone());
            true
        });

        if won {
            info!("✅ Conversation marked complete: {}", reason);
            if let Some(callback) = &self.on_complete {
                callback();
            }
        } else {
            debug!(%reason, "completion already latched");
        }
        won
    }

    /// Wait until complete or `timeout` elapses. A timeout completes the conversation itself.
    /// Returns whichever reason won the latch.
    pub async fn wait_for_completion(&self, timeout: Duration) -> CompletionReason {
        let mut rx = self.completion.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(Option::is_some))
            .await
            .map(|res| res.ok().and_then(|value| (*value).clone()));

        if let Ok(Some(reason)) = waited {
            info!("✅ Conversation completion detected");
            return reason;
        }

        let after_minutes = timeout.as_secs_f64() / 60.0;
        warn!("⏰ Conversation timeout after {:.1} minutes", after_minutes);
        let fallback = CompletionReason::Timeout { after_minutes };
        self.mark_complete(fallback.clone());
        self.completion_reason().unwrap_or(fallback)
    }

    /// [`wait_for_completion`](Self::wait_for_completion) with the configured timeout.
    pub async fn wait_for_completion_default(&self) -> CompletionReason {
        self.wait_for_completion(self.config.wait_timeout()).await
    }

    /// Receiver observing the latch; `Some` once complete.
    pub fn subscribe(&self) -> watch::Receiver<Option<CompletionReason>> {
        self.completion.subscribe()
    }

    pub fn is_complete(&self) -> bool {
        self.completion.borrow().is_some()
    }

    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.completion.borrow().clone()
    }

    /// Minutes since the conversation started, by wall clock.
    pub fn current_duration_minutes(&self) -> f64 {
        self.minutes_at(Utc::now())
    }

    /// Every transcript entry so far, in arrival order.
    pub fn full_transcript(&self) -> Vec<TranscriptEntry> {
        match self.transcript.read() {
            Ok(t) => t.snapshot(),
            Err(poisoned) => poisoned.into_inner().snapshot(),
        }
    }

    pub async fn progress(&self) -> ProgressSnapshot {
        let state = self.state.lock().await;
        ProgressSnapshot {
            current_question_index: state.current_question_index,
            questions_asked: state.questions_asked,
            total_questions: self.questions.len(),
            closing_phrases: state.closing_phrases_seen.clone(),
            duration_minutes: state
                .last_event_at
                .map_or(0.0, |at| self.minutes_at(at)),
            complete: self.is_complete(),
        }
    }

    /// Seconds since the agent last spoke, if it has.
    pub async fn seconds_since_agent_speech(&self) -> Option<f64> {
        let state = self.state.lock().await;
        state
            .last_agent_speech_at
            .map(|at| (Utc::now() - at).num_milliseconds().max(0) as f64 / 1000.0)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Run buffered agent speech through the matcher and clear it, matched or not.
    async fn flush_accumulator(&self, state: &mut ConversationState) {
        let Some(text) = state.accumulator.take() else {
            return;
        };

        let cursor = state.current_question_index;
        let Some(idx) = self.matcher.match_question(&text, &self.questions, cursor) else {
            debug!("no question match for buffered agent speech");
            return;
        };
        if idx < cursor {
            return;
        }

        // Advance before the send; the handler may be cancelled while it is pending.
        state.current_question_index = idx + 1;
        state.questions_asked = state.questions_asked.max(idx + 1);
        info!("📊 Progress updated to Q{} based on accumulated speech", idx + 1);
        self.send_progress(idx).await;
    }

    async fn record(&self, speaker: Speaker, text: &str, at: DateTime<Utc>) {
        let timestamp = self.seconds_at(at);
        match self.transcript.write() {
            Ok(mut t) => t.append(speaker, text, timestamp),
            Err(poisoned) => poisoned.into_inner().append(speaker, text, timestamp),
        }
        debug!("📝 {} transcript: {}", speaker, preview(text));

        self.notify(OutboundEvent::Transcript {
            speaker,
            text: text.to_string(),
            timestamp,
        })
        .await;
    }

    async fn send_progress(&self, question_index: usize) {
        let Some(question) = self.questions.get(question_index) else {
            return;
        };
        let total = self.questions.len();
        let sent = self
            .notify(OutboundEvent::Progress {
                question_index,
                category: question.category.clone(),
                total_questions: total,
            })
            .await;
        if sent {
            info!(
                "📊 Sent progress event: question {}/{} ({})",
                question_index + 1,
                total,
                question.category
            );
        }
    }

    /// Best-effort delivery bounded by `notify_timeout_secs`; failures are logged and swallowed.
    async fn notify(&self, event: OutboundEvent) -> bool {
        if !self.target.is_set() {
            return false;
        }
        let limit = self.config.notify_timeout();
        match tokio::time::timeout(limit, self.notifier.send(&self.target, &event)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("⚠️ Failed to send {} event: {}", event.kind(), e);
                false
            }
            Err(_) => {
                warn!(
                    "⏰ Gave up sending {} event after {:.1}s",
                    event.kind(),
                    limit.as_secs_f64()
                );
                false
            }
        }
    }

    /// Seconds since start, rounded to centiseconds and never negative.
    fn seconds_at(&self, at: DateTime<Utc>) -> f64 {
        let ms = (at - self.started_at).num_milliseconds().max(0) as f64;
        (ms / 10.0).round() / 100.0
    }

    fn minutes_at(&self, at: DateTime<Utc>) -> f64 {
        (at - self.started_at).num_milliseconds().max(0) as f64 / 60_000.0
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
