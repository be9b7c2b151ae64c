//! Turn driver: agent events in, assistant message snapshots out.

pub mod aggregator;

pub use aggregator::{ResponseAggregator, Snapshot, TurnState};

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::agent::{AgentEvent, AgentSession};
use crate::error::Result;
use crate::types::{ChatTurn, UserMessage};

/// Fold an event stream into snapshots, one per consumed event plus a final
/// one. Consumption stops at the first terminal state.
pub fn aggregate(
    mut events: BoxStream<'static, Result<AgentEvent>>,
    mut aggregator: ResponseAggregator,
) -> BoxStream<'static, Snapshot> {
    let stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            let snapshot = match event {
                Ok(event) => aggregator.apply(event),
                Err(e) => aggregator.fail(&e),
            };
            let Some(snapshot) = snapshot else {
                return;
            };
            let terminal = snapshot.state.is_terminal();
            yield snapshot;
            if terminal {
                return;
            }
        }
        if let Some(snapshot) = aggregator.finish() {
            yield snapshot;
        }
    };
    Box::pin(stream)
}

/// Run a full turn against `session`.
///
/// When `session_id` is set, stored history is used if `history` is empty,
/// and the completed turn is saved before the final snapshot is emitted.
/// Dropping the stream abandons the turn and nothing is saved.
pub fn run_turn(
    session: &AgentSession,
    message: UserMessage,
    history: Vec<ChatTurn>,
    session_id: Option<String>,
) -> BoxStream<'static, Snapshot> {
    let session = session.clone();

    let stream = async_stream::stream! {
        let history = match session.history(session_id.as_deref(), history).await {
            Ok(history) => history,
            Err(e) => {
                let mut aggregator = ResponseAggregator::new(message, Vec::new());
                if let Some(snapshot) = aggregator.fail(&e) {
                    yield snapshot;
                }
                return;
            }
        };

        let events = session.handle(message.clone(), history.clone());
        let mut snapshots = aggregate(events, ResponseAggregator::new(message.clone(), history.clone()));

        while let Some(snapshot) = snapshots.next().await {
            if snapshot.state == TurnState::Completed {
                if let Some(id) = session_id.as_deref() {
                    let mut updated = history.clone();
                    updated.push(ChatTurn {
                        input: message.clone(),
                        output: snapshot.message.clone(),
                    });
                    session.remember(id, &updated).await;
                    debug!(session_id = %id, turns = updated.len(), "session history saved");
                }
            }
            yield snapshot;
        }
    };

    Box::pin(stream)
}
