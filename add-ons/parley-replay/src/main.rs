//! Parley Replay: drive the conversation tracker from a recorded speech event stream.
//!
//! Usage:
//!   cargo run -p parley-replay -- --plan questions.toml [--events session.jsonl] [--recipient ID]
//!                                 [--timeout SECS] [--started-at RFC3339] [--pace]
//!
//! Events are JSON lines (`{"type":"agent_speech","text":"...","emitted_at":"..."}`), read
//! from `--events` or stdin. Outbound notifications are written to stdout as JSON lines,
//! followed by a summary record with the completion reason and the full transcript.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::{
    transcript_to_json, ConversationEvent, ConversationTracker, EventRegistry, Notifier,
    NotifyTarget, OutboundEvent, ParleyResult, QuestionPlan, TrackerConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Writes each outbound event to stdout as one JSON line.
struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, target: &NotifyTarget, event: &OutboundEvent) -> ParleyResult<()> {
        let line = serde_json::to_string(&serde_json::json!({
            "recipient": target.recipient_id,
            "event": event,
        }))?;
        println!("{}", line);
        Ok(())
    }
}

struct Args {
    plan: Option<PathBuf>,
    events: Option<PathBuf>,
    recipient: String,
    timeout_secs: Option<u64>,
    started_at: Option<DateTime<Utc>>,
    pace: bool,
}

fn parse_args() -> Args {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        plan: None,
        events: None,
        recipient: "replay-viewer".to_string(),
        timeout_secs: None,
        started_at: None,
        pace: false,
    };

    while let Some(a) = args.next() {
        match a.as_str() {
            "--plan" => parsed.plan = args.next().map(PathBuf::from),
            "--events" => parsed.events = args.next().map(PathBuf::from).filter(|p| p.to_str() != Some("-")),
            "--recipient" => {
                if let Some(r) = args.next() {
                    parsed.recipient = r;
                }
            }
            "--timeout" => parsed.timeout_secs = args.next().and_then(|s| s.parse().ok()),
            "--started-at" => {
                parsed.started_at = args
                    .next()
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
            }
            "--pace" => parsed.pace = true,
            other => warn!("ignoring unknown argument {}", other),
        }
    }
    parsed
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[parley-replay] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = parse_args();
    let Some(plan_path) = args.plan else {
        eprintln!("Parley Replay — conversation progress over recorded speech events");
        eprintln!("  --plan PATH         Question plan (.toml or .json), required");
        eprintln!("  --events PATH       JSONL speech events (default: stdin)");
        eprintln!("  --recipient ID      Notifier recipient id (default: replay-viewer)");
        eprintln!("  --timeout SECS      Completion wait timeout (default: config, 900)");
        eprintln!("  --started-at TIME   Conversation start (RFC 3339) for recorded streams (default: now)");
        eprintln!("  --pace              Sleep between events according to emitted_at");
        eprintln!();
        eprintln!("Config: PARLEY_CONFIG (default config/parley.toml), PARLEY__* overrides.");
        return Ok(());
    };

    let config = TrackerConfig::load()?;
    let timeout = args
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.wait_timeout());
    let questions = QuestionPlan::load(&plan_path)?.into_questions();

    let mut builder = ConversationTracker::builder(questions)
        .config(config)
        .notifier(Arc::new(StdoutNotifier))
        .target(NotifyTarget::new(args.recipient))
        .on_complete(Arc::new(|| info!("🏁 Completion callback fired")));
    if let Some(started_at) = args.started_at {
        builder = builder.started_at(started_at);
    }
    let tracker = Arc::new(builder.build()?);

    let mut registry = EventRegistry::new();
    tracker.register_events(&mut registry);

    let source: Box<dyn AsyncBufRead + Unpin + Send> = match &args.events {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    info!(
        plan = %plan_path.display(),
        questions = tracker.questions().len(),
        timeout_secs = timeout.as_secs(),
        "Parley replay started"
    );

    let feeder = tokio::spawn(feed(Arc::clone(&tracker), registry, source, args.pace));

    tokio::select! {
        reason = tracker.wait_for_completion(timeout) => {
            info!(%reason, "Conversation finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("CTRL-C received; stopping replay");
        }
    }

    // The conversation is over; later events in the stream are not replayed.
    if !feeder.is_finished() {
        feeder.abort();
    }

    let summary = serde_json::json!({
        "type": "summary",
        "reason": tracker.completion_reason(),
        "progress": tracker.progress().await,
        "transcript": transcript_to_json(&tracker.full_transcript())?,
    });
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

/// Decode and dispatch every line of the stream. Bad lines are logged and skipped.
async fn feed(
    tracker: Arc<ConversationTracker>,
    registry: EventRegistry,
    source: Box<dyn AsyncBufRead + Unpin + Send>,
    pace: bool,
) {
    let mut lines = source.lines();
    let mut previous: Option<DateTime<Utc>> = None;
    let mut dispatched = 0usize;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "event stream read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match registry.decode_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "skipping event");
                continue;
            }
        };

        if pace {
            if let Some(at) = emitted_at(&event) {
                if let Some(prev) = previous {
                    if let Ok(delta) = (at - prev).to_std() {
                        tokio::time::sleep(delta).await;
                    }
                }
                previous = Some(at);
            }
        }

        tracker.dispatch(event).await;
        dispatched += 1;
    }

    info!(dispatched, "Event stream drained");
}

fn emitted_at(event: &ConversationEvent) -> Option<DateTime<Utc>> {
    match event {
        ConversationEvent::AgentSpeech(f) | ConversationEvent::UserSpeech(f) => Some(f.emitted_at),
        ConversationEvent::Custom { .. } => None,
    }
}
