//! End-to-end flows through the public tracker API.

use chrono::{DateTime, TimeZone, Utc};
use parley_core::{
    ChannelNotifier, CompletionReason, ConversationTracker, EventRegistry, NotifyTarget,
    OutboundEvent, Question, SpeechFragment, TrackerConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 11, 14, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(secs)
}

fn interview_plan() -> Vec<Question> {
    vec![
        Question::new("Walk me through your most recent project", "experience"),
        Question::new("How did you handle database migrations at scale", "technical"),
        Question::new("Describe a time you disagreed with a teammate", "behavioral"),
        Question::new("What motivates you in your work", "motivation"),
        Question::new("Do you have any questions for us", "wrap-up"),
    ]
}

fn counting_tracker(counter: &Arc<AtomicUsize>) -> ConversationTracker {
    let c = Arc::clone(counter);
    ConversationTracker::builder(interview_plan())
        .started_at(t0())
        .on_complete(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .expect("tracker builds with default config")
}

#[tokio::test]
async fn test_full_interview_reaches_completion() {
    init_tracing();

    let (notifier, mut rx) = ChannelNotifier::new();
    let tracker = ConversationTracker::builder(interview_plan())
        .started_at(t0())
        .notifier(Arc::new(notifier))
        .target(NotifyTarget::new("interviewer-bot"))
        .build()
        .unwrap();

    let script: Vec<(bool, &str, i64)> = vec![
        (true, "Hi, thanks for joining.", 0),
        (true, "Let's start. Walk me through", 2),
        (true, "your most recent project.", 3),
        (false, "Sure, I rebuilt our billing pipeline.", 10),
        (true, "Nice. How did you handle", 60),
        (true, "database migrations at scale?", 61),
        (false, "We used online schema changes.", 70),
        (true, "Describe a time you disagreed with a teammate.", 120),
        (false, "?", 125),
        (false, "We argued about caching once.", 130),
        (true, "What motivates you in your work?", 200),
        (false, "Shipping things people use.", 210),
        (true, "Great. That concludes the interview, best of luck!", 300),
    ];

    for (is_agent, text, secs) in script {
        let fragment = SpeechFragment::new(text, at(secs));
        if is_agent {
            tracker.on_agent_speech(fragment).await;
        } else {
            tracker.on_user_speech(fragment).await;
        }
    }

    let progress = tracker.progress().await;
    assert_eq!(progress.questions_asked, 4);
    assert_eq!(progress.current_question_index, 5);
    assert!(progress.complete);

    match tracker.completion_reason() {
        Some(CompletionReason::AgentClosing {
            questions_asked,
            enough_questions,
            enough_time,
            ..
        }) => {
            assert_eq!(questions_asked, 4);
            assert!(enough_questions);
            assert!(!enough_time);
        }
        other => panic!("unexpected completion: {:?}", other),
    }

    let mut progress_indices = Vec::new();
    let mut transcript_lines = 0;
    while let Ok((target, event)) = rx.try_recv() {
        assert_eq!(target.recipient_id, "interviewer-bot");
        match event {
            OutboundEvent::Progress {
                question_index,
                total_questions,
                ..
            } => {
                assert_eq!(total_questions, 5);
                progress_indices.push(question_index);
            }
            OutboundEvent::Transcript { .. } => transcript_lines += 1,
        }
    }
    assert_eq!(progress_indices, vec![0, 1, 2, 3, 4]);
    // "?" never reaches the transcript or the viewer.
    assert_eq!(transcript_lines, 12);

    let transcript = tracker.full_transcript();
    assert_eq!(transcript.len(), 12);
    assert!(transcript.iter().all(|e| e.text != "?"));
    assert!(transcript.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_counters_never_move_backward() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tracker = counting_tracker(&counter);

    let script = [
        (true, "Describe a time you disagreed with a teammate", 0),
        (false, "Okay", 5),
        // Earlier question repeated after a later one matched: must not rewind.
        (true, "Walk me through your most recent project again", 10),
        (false, "Right", 15),
        (true, "What motivates you in your work", 20),
        (false, "Curiosity", 25),
        (true, "How did you handle database migrations at scale", 30),
        (false, "Carefully", 35),
    ];

    let mut last = (0, 0);
    for (is_agent, text, secs) in script {
        let fragment = SpeechFragment::new(text, at(secs));
        if is_agent {
            tracker.on_agent_speech(fragment).await;
        } else {
            tracker.on_user_speech(fragment).await;
        }
        let p = tracker.progress().await;
        assert!(p.current_question_index >= last.0);
        assert!(p.questions_asked >= last.1);
        last = (p.current_question_index, p.questions_asked);
    }
    assert_eq!(last, (4, 4));
}

#[tokio::test]
async fn test_every_trigger_fires_callback_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tracker = Arc::new(counting_tracker(&counter));

    tracker
        .on_user_speech(SpeechFragment::new("Okay, bye for now", at(30)))
        .await;
    assert!(matches!(
        tracker.completion_reason(),
        Some(CompletionReason::UserGoodbye { .. })
    ));

    tracker
        .on_agent_speech(SpeechFragment::new("Goodbye and good luck!", at(9 * 60)))
        .await;
    tracker
        .on_user_speech(SpeechFragment::new("Goodbye!", at(9 * 60 + 5)))
        .await;
    let reason = tracker.wait_for_completion(Duration::from_millis(10)).await;

    assert!(matches!(reason, CompletionReason::UserGoodbye { .. }));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    // Transcript keeps growing after completion.
    assert_eq!(tracker.full_transcript().len(), 3);
}

#[tokio::test]
async fn test_agent_closing_latch_survives_later_triggers() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tracker = counting_tracker(&counter);

    tracker
        .on_agent_speech(SpeechFragment::new("Thanks, that concludes our time.", at(9 * 60)))
        .await;
    assert!(matches!(
        tracker.completion_reason(),
        Some(CompletionReason::AgentClosing { enough_time: true, .. })
    ));

    tracker
        .on_user_speech(SpeechFragment::new("Bye!", at(9 * 60 + 3)))
        .await;
    let reason = tracker.wait_for_completion(Duration::from_millis(10)).await;

    assert!(matches!(reason, CompletionReason::AgentClosing { .. }));
    assert!(matches!(
        tracker.completion_reason(),
        Some(CompletionReason::AgentClosing { .. })
    ));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_waiters_share_one_completion() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tracker = Arc::new(counting_tracker(&counter));

    let waiter_a = {
        let t = Arc::clone(&tracker);
        tokio::spawn(async move { t.wait_for_completion(Duration::from_secs(30)).await })
    };
    let waiter_b = {
        let t = Arc::clone(&tracker);
        tokio::spawn(async move { t.wait_for_completion(Duration::from_millis(50)).await })
    };

    let b = waiter_b.await.unwrap();
    assert!(b.is_timeout());

    // The long waiter observes the same latched reason, not a second completion.
    let a = waiter_a.await.unwrap();
    assert_eq!(a, b);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_events_are_serialized() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tracker = Arc::new(counting_tracker(&counter));

    let mut handles = Vec::new();
    for i in 0..20i64 {
        let t = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            let text = format!("fragment number {}", i);
            if i % 2 == 0 {
                t.on_agent_speech(SpeechFragment::new(text, at(i))).await;
            } else {
                t.on_user_speech(SpeechFragment::new(text, at(i))).await;
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(tracker.full_transcript().len(), 20);
    assert!(!tracker.is_complete());
}

#[tokio::test]
async fn test_custom_thresholds_from_config() {
    let config = TrackerConfig::from_toml_str(
        r#"
        minimum_duration_minutes = 1
        accumulator_gap_secs = 10.0
        closing_phrases = ["see you soon"]
        "#,
    )
    .unwrap();
    let tracker = ConversationTracker::builder(interview_plan())
        .started_at(t0())
        .config(config)
        .build()
        .unwrap();

    // Default phrases no longer count.
    tracker
        .on_agent_speech(SpeechFragment::new("That concludes things.", at(120)))
        .await;
    assert!(!tracker.is_complete());

    // 5s apart stays in one buffer with a 10s gap threshold.
    tracker
        .on_agent_speech(SpeechFragment::new("Walk me through", at(130)))
        .await;
    tracker
        .on_agent_speech(SpeechFragment::new("your most recent project", at(135)))
        .await;
    tracker
        .on_agent_speech(SpeechFragment::new("See you soon!", at(140)))
        .await;
    assert!(matches!(
        tracker.completion_reason(),
        Some(CompletionReason::AgentClosing { enough_time: true, .. })
    ));
}

#[tokio::test]
async fn test_registry_decodes_host_stream() {
    let tracker = ConversationTracker::builder(interview_plan())
        .started_at(t0())
        .build()
        .unwrap();
    let mut registry = EventRegistry::new();
    tracker.register_events(&mut registry);

    let lines = [
        r#"{"type":"agent_speech","text":"Walk me through your most recent project","emitted_at":"2026-05-11T14:00:05Z"}"#,
        r#"{"type":"custom","custom":{"type":"progress","questionIndex":0}}"#,
        r#"{"type":"user_speech","text":"I led a rewrite.","emitted_at":"2026-05-11T14:00:09Z"}"#,
    ];
    for line in lines {
        if let Some(event) = registry.decode_line(line).unwrap() {
            tracker.dispatch(event).await;
        }
    }

    assert!(registry.decode_line(r#"{"type":"participant_joined"}"#).is_err());

    let transcript = tracker.full_transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].timestamp, 5.0);
    assert_eq!(transcript[1].timestamp, 9.0);
    assert_eq!(tracker.progress().await.questions_asked, 1);
}
