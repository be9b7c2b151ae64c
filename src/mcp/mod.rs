//! Model Context Protocol (MCP) tool services.

pub mod client;
pub mod descriptor;
pub mod registry;
pub mod schema;
pub mod transport;

pub use client::{McpClient, McpConnectionState};
pub use descriptor::{load_descriptors, ServerDescriptor, TransportKind};
pub use registry::{CapabilityRegistry, McpClientOps, McpToolHandle};
pub use schema::{McpToolCallResult, McpToolSchema};
