pub mod apify;
pub mod config;
pub mod error;
pub mod mcp;
pub mod server;
pub mod session;
pub mod sse;
pub mod stdio;
