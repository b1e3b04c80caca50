// Copyright 2025 Cardbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! REST transport.
//!
//! One pooled [`reqwest::Client`] is built per invocation and reused for
//! every call, so only the first request pays for connection setup.

use async_trait::async_trait;
use cardbench_core::{EndpointPaths, OperationCall, Transport};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

use crate::error::{AdapterError, Result};
use crate::{CallResponse, ModelcardClient};

/// Build the full request URL for a call against a base URL.
///
/// The base may carry a path prefix (e.g. `http://host/api`); operation
/// paths are appended to it rather than replacing it.
pub fn request_url(base_url: &str, paths: &EndpointPaths, call: &OperationCall) -> Result<Url> {
    let path = paths.path_for(call);
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url = Url::parse(&joined).map_err(|e| AdapterError::InvalidUrl {
        url: joined.clone(),
        reason: e.to_string(),
    })?;
    if let Some((key, value)) = EndpointPaths::query_for(call) {
        url.query_pairs_mut().append_pair(key, value);
    }
    Ok(url)
}

/// REST client for the model card API.
pub struct RestClient {
    http: Client,
    base_url: String,
    paths: EndpointPaths,
}

impl RestClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: &str, paths: EndpointPaths, timeout: Duration) -> Result<Self> {
        Url::parse(base_url).map_err(|e| AdapterError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            paths,
        })
    }

    /// URL requested for a call.
    pub fn url_for(&self, call: &OperationCall) -> Result<Url> {
        request_url(&self.base_url, &self.paths, call)
    }
}

#[async_trait]
impl ModelcardClient for RestClient {
    fn transport(&self) -> Transport {
        Transport::Rest
    }

    async fn call(&self, call: &OperationCall) -> Result<CallResponse> {
        let url = self.url_for(call)?;
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.bytes().await?;
        debug!(operation = %call.operation, bytes = body.len(), "REST call completed");
        Ok(CallResponse {
            size_bytes: body.len(),
        })
    }
}
