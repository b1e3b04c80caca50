// Copyright 2025 Cardbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! JSON-RPC 2.0 framing used by MCP.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AdapterError, Result};

/// Outgoing request or notification.
///
/// Notifications carry no id and get no response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl JsonRpcRequest {
    /// Request expecting a response with the same id.
    pub fn request(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Fire-and-forget notification.
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Request id, `None` for notifications.
    pub fn id(&self) -> Option<u64> {
        self.id
    }
}

/// Error object of a failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i64,
    /// Human readable message
    pub message: String,
    /// Optional extra data
    #[serde(default)]
    pub data: Option<Value>,
}

/// Any incoming message: response, server request or notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcMessage {
    /// Id echoed from the request
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name when the server itself sends a request or notification
    #[serde(default)]
    pub method: Option<String>,
    /// Successful result
    #[serde(default)]
    pub result: Option<Value>,
    /// Error object
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcMessage {
    /// Id of a response to one of our requests.
    ///
    /// Server-initiated messages carry a method and are never treated as
    /// responses, even when their id collides with ours.
    pub fn response_id(&self) -> Option<u64> {
        if self.method.is_some() {
            return None;
        }
        self.id.as_ref().and_then(Value::as_u64)
    }

    /// Turn the response into its result or error.
    pub fn into_result(self) -> Result<Value> {
        if let Some(error) = self.error {
            return Err(AdapterError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result.ok_or_else(|| {
            AdapterError::Protocol("response has neither result nor error".to_string())
        })
    }
}
