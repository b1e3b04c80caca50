// Copyright 2025 Cardbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Errors raised by transport clients.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the server under test.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Unexpected status {status} from {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Endpoint URL could not be parsed
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// MCP or SSE protocol violation
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON-RPC error object returned by the server
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Server message
        message: String,
    },

    /// Tool call completed with `isError` set
    #[error("Tool call failed: {0}")]
    ToolFailed(String),

    /// No response within the configured bound
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The event stream ended while a call was outstanding
    #[error("Session closed")]
    SessionClosed,

    /// The transport cannot be used for the requested operation
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Host name not usable for TLS
    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
