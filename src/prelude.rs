//! Convenience re-exports for common use.

pub use crate::agent::{AgentEvent, AgentSession};
pub use crate::config::Settings;
pub use crate::error::{ChattrError, Result};
pub use crate::response::{run_turn, ResponseAggregator, Snapshot, TurnState};
pub use crate::tools::{FnTool, ToolArguments, ToolHandle, ToolParameters};
pub use crate::types::{AssistantMessage, ChatTurn, MediaKind, ToolOutput, UserMessage};
