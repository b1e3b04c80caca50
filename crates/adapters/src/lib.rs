//! Transport clients for the cardbench runners.
//!
//! Every transport that can be benchmarked call-by-call implements
//! [`ModelcardClient`]. The runner holds exactly one client for the whole
//! invocation and drops it on exit.
//!
//! - [`rest`] - pooled HTTP client against the REST API
//! - [`mcp`] - MCP session over server-sent events (native and layered)
//! - [`socket`] - raw socket probe that times each stage of one request
//!
//! # Example
//!
//! ```ignore
//! use cardbench_adapters::connect;
//! use cardbench_core::{BenchConfig, Operation, Transport};
//!
//! let config = BenchConfig::from_env()?;
//! let client = connect(Transport::Rest, &config).await?;
//! let response = client.call(&config.call_for(Operation::GetModelcard)).await?;
//! println!("{} bytes", response.size_bytes);
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod mcp;
pub mod rest;
pub mod socket;

use async_trait::async_trait;
use cardbench_core::{BenchConfig, OperationCall, Transport};
use tracing::info;

pub use error::{AdapterError, Result};
pub use mcp::McpSession;
pub use rest::RestClient;
pub use socket::{SocketProbe, SocketTiming};

/// Outcome of one successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallResponse {
    /// Size of the response payload in bytes
    pub size_bytes: usize,
}

impl CallResponse {
    /// Response size in kilobytes.
    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }
}

/// A client that performs benchmarked calls against one server.
///
/// Implementations must be shareable across worker tasks; the throughput
/// mode drives one client from several tasks at once.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ModelcardClient: Send + Sync {
    /// The transport this client measures.
    fn transport(&self) -> Transport;

    /// Perform one call and wait for its complete response.
    async fn call(&self, call: &OperationCall) -> Result<CallResponse>;
}

/// Open the client for a transport.
///
/// Session-based transports complete their handshake here, so a server
/// that cannot be reached fails the run before any sample is taken.
pub async fn connect(
    transport: Transport,
    config: &BenchConfig,
) -> Result<Box<dyn ModelcardClient>> {
    match transport {
        Transport::Rest => {
            let client = RestClient::new(
                &config.server_url,
                config.paths.clone(),
                config.request_timeout,
            )?;
            info!(url = %config.server_url, "REST client ready");
            Ok(Box::new(client))
        }
        Transport::NativeMcp | Transport::LayeredMcp => {
            let session =
                McpSession::connect(&config.server_url, transport, config.request_timeout).await?;
            info!(url = %config.server_url, transport = %transport, "MCP session initialized");
            Ok(Box::new(session))
        }
        Transport::Database => Err(AdapterError::Unsupported(
            "the database baseline is reported by the server and cannot be called directly"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbench_core::Operation;

    #[test]
    fn test_call_response_size_kb() {
        let response = CallResponse { size_bytes: 2048 };
        assert_eq!(response.size_kb(), 2.0);
    }

    #[tokio::test]
    async fn test_database_transport_is_not_callable() {
        let config = BenchConfig::default();
        let result = connect(Transport::Database, &config).await;
        assert!(matches!(result, Err(AdapterError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_mock_client() {
        let mut mock = MockModelcardClient::new();
        mock.expect_transport().return_const(Transport::Rest);
        mock.expect_call()
            .times(1)
            .returning(|_| Ok(CallResponse { size_bytes: 10 }));

        let call = OperationCall::get("abc");
        assert_eq!(call.operation, Operation::GetModelcard);
        assert_eq!(mock.call(&call).await.unwrap().size_bytes, 10);
        assert_eq!(mock.transport(), Transport::Rest);
    }
}
