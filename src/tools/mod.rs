//! Tool handles exposed to the agent.

pub mod arguments;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use tool::{FnTool, ToolHandle};
pub use types::ToolParameters;
