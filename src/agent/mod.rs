//! Character agent: prompt, tool loop and the session facade.

pub mod events;
pub mod instructions;
pub mod runner;
pub mod session;

pub use events::AgentEvent;
pub use runner::ToolLoop;
pub use session::AgentSession;
