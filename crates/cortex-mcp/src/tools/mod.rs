//! MCP tool handlers. Each module exposes `schema()` (JSON Schema for the
//! tool's input) and `execute()` (the handler itself), mirroring the shape
//! `McpServer::handle_tools_call` dispatches on.

pub mod forget;
pub mod list_relations;
pub mod recall;
pub mod remember;
pub mod search;
pub mod stats;
