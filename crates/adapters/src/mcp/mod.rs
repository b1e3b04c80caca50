// Copyright 2025 Cardbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! MCP transport over server-sent events.
//!
//! The session opens one event stream, learns the message endpoint from
//! the first `endpoint` event, performs the `initialize` handshake and then
//! issues `tools/call` requests whose responses come back on the stream.
//! Native and layered MCP servers speak the same protocol; only the
//! transport label differs.

pub mod jsonrpc;
pub mod session;
pub mod sse;

pub use jsonrpc::{JsonRpcError, JsonRpcMessage, JsonRpcRequest};
pub use session::McpSession;
pub use sse::{SseDecoder, SseEvent};

/// Protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
