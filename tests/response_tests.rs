//! Aggregation properties over generated event sequences.

use futures::StreamExt;
use pretty_assertions::assert_eq;

use chattr::agent::AgentEvent;
use chattr::error::{Result, BLOCKED_MESSAGE};
use chattr::response::{aggregate, ResponseAggregator, Snapshot, TurnState};
use chattr::types::{MediaKind, ToolOutput, UserMessage};

/// Deterministic pseudo-random sequence (xorshift), so failures reproduce.
fn sequence(seed: u64, len: usize) -> Vec<AgentEvent> {
    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    (0..len)
        .map(|i| match next() % 5 {
            0 | 1 => AgentEvent::fragment(format!("w{i} ")),
            2 => AgentEvent::tool_started("tts", serde_json::json!({"text": i})),
            3 => AgentEvent::tool_completed("tts", ToolOutput::audio(format!("a{i}.wav"))),
            _ => AgentEvent::tool_completed("render", ToolOutput::video(format!("v{i}.mp4"))),
        })
        .collect()
}

async fn run(events: Vec<AgentEvent>) -> Vec<Snapshot> {
    let items: Vec<Result<AgentEvent>> = events.into_iter().map(Ok).collect();
    aggregate(
        Box::pin(futures::stream::iter(items)),
        ResponseAggregator::new(UserMessage::new("Salut"), Vec::new()),
    )
    .collect()
    .await
}

#[tokio::test]
async fn text_is_the_concatenation_of_fragments() {
    for seed in 1..50 {
        let events = sequence(seed, 30);
        let expected: String = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::ContentFragment { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let snapshots = run(events).await;
        assert_eq!(snapshots.last().unwrap().message.text, expected, "seed {seed}");
    }
}

#[tokio::test]
async fn media_refs_follow_the_last_result_of_their_kind() {
    for seed in 1..50 {
        let events = sequence(seed, 30);
        let last_ref = |kind: MediaKind| {
            events.iter().rev().find_map(|e| match e {
                AgentEvent::ToolCompleted { output, .. } if output.kind == kind => {
                    output.reference.clone()
                }
                _ => None,
            })
        };
        let (audio, video) = (last_ref(MediaKind::Audio), last_ref(MediaKind::Video));
        let last = run(events.clone()).await.pop().unwrap();
        assert_eq!(last.message.audio_ref, audio, "seed {seed}");
        assert_eq!(last.message.video_ref, video, "seed {seed}");
    }
}

#[tokio::test]
async fn one_snapshot_per_event_plus_final() {
    for seed in 1..20 {
        let events = sequence(seed, 25);
        let snapshots = run(events).await;
        assert_eq!(snapshots.len(), 26);
        assert_eq!(snapshots.last().unwrap().state, TurnState::Completed);
        assert!(snapshots[..25].iter().all(|s| s.state == TurnState::Streaming));
    }
}

#[tokio::test]
async fn replay_is_bit_identical() {
    for seed in 1..20 {
        let events = sequence(seed, 40);
        let first = serde_json::to_string(&run(events.clone()).await).unwrap();
        let second = serde_json::to_string(&run(events).await).unwrap();
        assert_eq!(first, second, "seed {seed}");
    }
}

#[tokio::test]
async fn rejection_anywhere_halts_with_fixed_text() {
    for cut in 0..10 {
        let mut events = sequence(7, 10);
        events.insert(cut, AgentEvent::rejected("prompt injection detected"));
        let snapshots = run(events).await;

        assert_eq!(snapshots.len(), cut + 1);
        let last = snapshots.last().unwrap();
        assert_eq!(last.state, TurnState::Blocked);
        assert_eq!(last.message.text, BLOCKED_MESSAGE);
        assert!(last.message.activities.is_empty());
        assert_eq!(
            snapshots.iter().filter(|s| s.state.is_terminal()).count(),
            1
        );
    }
}
