// Copyright 2025 Cardbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Long-lived MCP session over SSE.

use async_trait::async_trait;
use cardbench_core::{OperationCall, Transport};
use dashmap::DashMap;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, Url};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::jsonrpc::{JsonRpcMessage, JsonRpcRequest};
use super::sse::SseDecoder;
use super::PROTOCOL_VERSION;
use crate::error::{AdapterError, Result};
use crate::{CallResponse, ModelcardClient};

type PendingCalls = Arc<DashMap<u64, oneshot::Sender<JsonRpcMessage>>>;

/// An initialized MCP session.
///
/// The event stream is read by a background task owned by the session;
/// dropping the session aborts that task and closes the stream.
pub struct McpSession {
    http: Client,
    endpoint: Url,
    pending: PendingCalls,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    timeout: Duration,
    transport: Transport,
    server_info: Value,
}

impl McpSession {
    /// Open the event stream, wait for the message endpoint and initialize.
    pub async fn connect(
        server_url: &str,
        transport: Transport,
        timeout: Duration,
    ) -> Result<Self> {
        let sse_url = Url::parse(server_url).map_err(|e| AdapterError::InvalidUrl {
            url: server_url.to_string(),
            reason: e.to_string(),
        })?;
        // no overall timeout: the event stream stays open for the whole run
        let http = Client::builder().connect_timeout(timeout).build()?;

        let response = tokio::time::timeout(
            timeout,
            http.get(sse_url.clone()).header(ACCEPT, "text/event-stream").send(),
        )
        .await
        .map_err(|_| AdapterError::Timeout(timeout))??;
        if !response.status().is_success() {
            return Err(AdapterError::Status {
                status: response.status().as_u16(),
                url: sse_url.to_string(),
            });
        }

        let pending: PendingCalls = Arc::new(DashMap::new());
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let reader = tokio::spawn(read_events(response, endpoint_tx, pending.clone()));

        let endpoint_path = match tokio::time::timeout(timeout, endpoint_rx).await {
            Ok(Ok(path)) => path,
            Ok(Err(_)) => {
                reader.abort();
                return Err(AdapterError::Protocol(
                    "event stream closed before announcing the message endpoint".to_string(),
                ));
            }
            Err(_) => {
                reader.abort();
                return Err(AdapterError::Timeout(timeout));
            }
        };
        let endpoint = match sse_url.join(&endpoint_path) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                reader.abort();
                return Err(AdapterError::InvalidUrl {
                    url: endpoint_path,
                    reason: e.to_string(),
                });
            }
        };
        debug!(endpoint = %endpoint, "MCP message endpoint announced");

        let mut session = Self {
            http,
            endpoint,
            pending,
            next_id: AtomicU64::new(1),
            reader,
            timeout,
            transport,
            server_info: Value::Null,
        };
        session.server_info = session.initialize().await?;
        Ok(session)
    }

    async fn initialize(&self) -> Result<Value> {
        let result = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "cardbench",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                })),
            )
            .await?;
        self.notify("notifications/initialized", None).await?;
        Ok(result.get("serverInfo").cloned().unwrap_or(Value::Null))
    }

    /// `serverInfo` returned by `initialize`.
    pub fn server_info(&self) -> &Value {
        &self.server_info
    }

    /// Send a request and wait for the matching response on the stream.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        if let Err(err) = self.post(&JsonRpcRequest::request(id, method, params)).await {
            self.pending.remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(message)) => message.into_result(),
            Ok(Err(_)) => Err(AdapterError::SessionClosed),
            Err(_) => {
                self.pending.remove(&id);
                Err(AdapterError::Timeout(self.timeout))
            }
        }
    }

    /// Send a notification; no response is expected.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.post(&JsonRpcRequest::notification(method, params)).await
    }

    /// Invoke a tool and return its result object.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        let result = self
            .request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await?;
        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(AdapterError::ToolFailed(tool_error_text(&result)));
        }
        Ok(result)
    }

    async fn post(&self, body: &JsonRpcRequest) -> Result<()> {
        let response = self.http.post(self.endpoint.clone()).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                status: status.as_u16(),
                url: self.endpoint.to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl ModelcardClient for McpSession {
    fn transport(&self) -> Transport {
        self.transport
    }

    async fn call(&self, call: &OperationCall) -> Result<CallResponse> {
        let result = self.call_tool(call.operation.name(), call.tool_arguments()).await?;
        let size_bytes = serde_json::to_vec(&result)?.len();
        Ok(CallResponse { size_bytes })
    }
}

fn tool_error_text(result: &Value) -> String {
    result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| items.iter().find_map(|item| item.get("text").and_then(Value::as_str)))
        .unwrap_or("tool reported an error")
        .to_string()
}

async fn read_events(
    response: Response,
    endpoint_tx: oneshot::Sender<String>,
    pending: PendingCalls,
) {
    let mut endpoint_tx = Some(endpoint_tx);
    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(error = %err, "MCP event stream failed");
                break;
            }
        };
        for event in decoder.feed(&chunk) {
            match event.event.as_str() {
                "endpoint" => {
                    if let Some(tx) = endpoint_tx.take() {
                        let _ = tx.send(event.data);
                    }
                }
                "message" => match serde_json::from_str::<JsonRpcMessage>(&event.data) {
                    Ok(message) => match message.response_id() {
                        Some(id) => match pending.remove(&id) {
                            Some((_, tx)) => {
                                let _ = tx.send(message);
                            }
                            None => debug!(id, "response for unknown or expired request"),
                        },
                        None => {
                            debug!(method = ?message.method, "ignoring server-initiated message")
                        }
                    },
                    Err(err) => warn!(error = %err, "undecodable MCP message"),
                },
                other => debug!(event = other, "ignoring SSE event"),
            }
        }
    }

    debug!("MCP event stream closed");
    // dropping the senders wakes every waiter with SessionClosed
    pending.clear();
}
