// Copyright 2025 Cardbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Raw socket probe.
//!
//! Each measurement opens a fresh connection and times every stage of a
//! single `GET` on its own: name resolution, socket creation, TCP connect,
//! TLS setup, request send, first byte, response read and close. The probe
//! is blocking; async callers run it on the blocking pool.

use cardbench_core::{EndpointPaths, OperationCall};
use reqwest::Url;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::{AdapterError, Result};
use crate::rest::request_url;

/// Bound on connection setup.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on each read once the request is sent.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 4096;

/// Stage durations of one probe, in seconds.
///
/// Stages after a failure stay at zero; `total_time` always covers the
/// whole attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SocketTiming {
    /// Host name resolution
    pub dns_lookup: f64,
    /// Socket allocation
    pub socket_creation: f64,
    /// TCP three-way handshake
    pub tcp_connect: f64,
    /// TLS client configuration, zero for plain HTTP
    pub ssl_context_creation: f64,
    /// TLS handshake, zero for plain HTTP
    pub ssl_handshake: f64,
    /// Writing the request
    pub request_send: f64,
    /// Waiting for the first response byte
    pub time_to_first_byte: f64,
    /// Reading the first response chunk
    pub response_read: f64,
    /// Closing the connection
    pub socket_close: f64,
    /// Server processing estimate, equal to time to first byte
    pub server_processing: f64,
    /// Whole attempt
    pub total_time: f64,
    /// Stage that failed, if any
    #[serde(skip)]
    pub failed_stage: Option<&'static str>,
}

impl SocketTiming {
    /// Whether every stage completed.
    pub fn is_complete(&self) -> bool {
        self.failed_stage.is_none()
    }

    /// CSV record in socket timing column order, led by the wall-clock
    /// timestamp of the measurement.
    pub fn to_record(&self, timestamp: f64) -> Vec<String> {
        [
            timestamp,
            self.dns_lookup,
            self.socket_creation,
            self.tcp_connect,
            self.ssl_context_creation,
            self.ssl_handshake,
            self.request_send,
            self.time_to_first_byte,
            self.response_read,
            self.socket_close,
            self.server_processing,
            self.total_time,
        ]
        .iter()
        .map(|v| v.to_string())
        .collect()
    }
}

enum Connection {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Connection {
    fn tcp(&self) -> &TcpStream {
        match self {
            Self::Plain(stream) => stream,
            Self::Tls(stream) => stream.get_ref(),
        }
    }

    fn close(self) -> std::io::Result<()> {
        match self {
            Self::Plain(stream) => stream.shutdown(Shutdown::Both),
            Self::Tls(mut stream) => {
                stream.conn.send_close_notify();
                // peer may already have closed after `Connection: close`
                let _ = stream.flush();
                stream.sock.shutdown(Shutdown::Both)
            }
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

/// Times single requests against one server over fresh connections.
#[derive(Debug, Clone)]
pub struct SocketProbe {
    base_url: String,
    host: String,
    port: u16,
    tls: bool,
}

impl SocketProbe {
    /// Create a probe for `http://` or `https://` base URLs.
    pub fn new(base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url).map_err(|e| AdapterError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let tls = match url.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(AdapterError::InvalidUrl {
                    url: base_url.to_string(),
                    reason: format!("unsupported scheme '{}'", other),
                })
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| AdapterError::InvalidUrl {
                url: base_url.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(if tls { 443 } else { 80 });
        Ok(Self {
            base_url: base_url.to_string(),
            host,
            port,
            tls,
        })
    }

    /// Request target (path and query) for a call.
    pub fn target_for(&self, paths: &EndpointPaths, call: &OperationCall) -> Result<String> {
        let url = request_url(&self.base_url, paths, call)?;
        Ok(match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        })
    }

    /// Time one request for `target`.
    ///
    /// Failures are logged and recorded in [`SocketTiming::failed_stage`];
    /// the timing is returned either way.
    pub fn measure(&self, target: &str) -> SocketTiming {
        let mut timing = SocketTiming::default();
        let started = Instant::now();
        if let Err((stage, err)) = self.run_stages(target, &mut timing) {
            warn!(stage, error = %err, host = %self.host, "socket probe failed");
            timing.failed_stage = Some(stage);
        }
        timing.total_time = started.elapsed().as_secs_f64();
        timing
    }

    fn run_stages(
        &self,
        target: &str,
        timing: &mut SocketTiming,
    ) -> std::result::Result<(), (&'static str, AdapterError)> {
        let t = Instant::now();
        let addr = self.resolve().map_err(|e| ("dns_lookup", e))?;
        timing.dns_lookup = t.elapsed().as_secs_f64();

        let t = Instant::now();
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ("socket_creation", AdapterError::from(e)))?;
        timing.socket_creation = t.elapsed().as_secs_f64();

        let t = Instant::now();
        socket
            .connect_timeout(&addr.into(), CONNECT_TIMEOUT)
            .map_err(|e| ("tcp_connect", AdapterError::from(e)))?;
        timing.tcp_connect = t.elapsed().as_secs_f64();
        let stream: TcpStream = socket.into();

        let mut conn = if self.tls {
            let t = Instant::now();
            let config = tls_config().map_err(|e| ("ssl_context_creation", e))?;
            timing.ssl_context_creation = t.elapsed().as_secs_f64();

            let t = Instant::now();
            let tls = self.handshake(config, stream).map_err(|e| ("ssl_handshake", e))?;
            timing.ssl_handshake = t.elapsed().as_secs_f64();
            Connection::Tls(Box::new(tls))
        } else {
            Connection::Plain(stream)
        };

        let t = Instant::now();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            target, self.host
        );
        conn.write_all(request.as_bytes())
            .and_then(|_| conn.flush())
            .map_err(|e| ("request_send", AdapterError::from(e)))?;
        timing.request_send = t.elapsed().as_secs_f64();

        conn.tcp()
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| ("time_to_first_byte", AdapterError::from(e)))?;

        let t = Instant::now();
        let mut first = [0u8; 1];
        let n = conn.read(&mut first).map_err(|e| ("time_to_first_byte", AdapterError::from(e)))?;
        if n == 0 {
            return Err((
                "time_to_first_byte",
                AdapterError::Protocol("connection closed before any response byte".to_string()),
            ));
        }
        timing.time_to_first_byte = t.elapsed().as_secs_f64();

        let t = Instant::now();
        let mut chunk = vec![0u8; READ_CHUNK];
        conn.read(&mut chunk).map_err(|e| ("response_read", AdapterError::from(e)))?;
        timing.response_read = t.elapsed().as_secs_f64();

        let t = Instant::now();
        conn.close().map_err(|e| ("socket_close", AdapterError::from(e)))?;
        timing.socket_close = t.elapsed().as_secs_f64();

        timing.server_processing = timing.time_to_first_byte;
        Ok(())
    }

    fn resolve(&self) -> Result<SocketAddr> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| AdapterError::Protocol(format!("no address for host '{}'", self.host)))
    }

    fn handshake(
        &self,
        config: Arc<ClientConfig>,
        mut stream: TcpStream,
    ) -> Result<StreamOwned<ClientConnection, TcpStream>> {
        let server_name = ServerName::try_from(self.host.clone())
            .map_err(|_| AdapterError::InvalidServerName(self.host.clone()))?;
        let mut conn = ClientConnection::new(config, server_name)?;
        stream.set_read_timeout(Some(CONNECT_TIMEOUT))?;
        while conn.is_handshaking() {
            conn.complete_io(&mut stream)?;
        }
        Ok(StreamOwned::new(conn, stream))
    }
}

fn tls_config() -> Result<Arc<ClientConfig>> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}
