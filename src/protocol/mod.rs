//! MCP protocol types (JSON-RPC 2.0 envelopes and tool payloads)

mod messages;
mod types;

pub use messages::*;
pub use types::*;

/// MCP protocol version spoken by this gateway
pub const PROTOCOL_VERSION: &str = "2024-11-05";
