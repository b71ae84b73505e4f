/// Centralized constants and helpers for MCP protocol
use serde_json::{json, Value};

/// MCP Protocol Version - single source of truth
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported in `serverInfo` and `/health`
pub const SERVER_NAME: &str = "facebook-scraper-unified-mcp-sse";

/// Human-readable name reported by `/`
pub const SERVER_DISPLAY_NAME: &str = "Facebook Scraper Unified MCP Server";

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// JSON-RPC envelope builders to ensure consistency
pub struct JsonRpcEnvelopes;

impl JsonRpcEnvelopes {
    /// Create JSON-RPC error response
    pub fn error_response(code: i32, message: &str, id: Option<Value>) -> Value {
        json!({
            "jsonrpc": "2.0",
            "error": {
                "code": code,
                "message": message
            },
            "id": id
        })
    }
}
