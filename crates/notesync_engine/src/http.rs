//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so different libraries
//! (reqwest, ureq, a platform webview bridge) can provide the wire without
//! this crate depending on any of them.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use notesync_protocol::{
    decode, encode, PullRequest, PullResponse, PushRequest, PushResponse, StatusResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// HTTP client abstraction.
///
/// Implementations send JSON bodies and return JSON bodies; any non-2xx
/// response or connection failure surfaces as the `Err` string.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body and returns the response body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;

    /// Sends a GET request and returns the response body.
    fn get(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// JSON-over-HTTP sync transport.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport against a server base URL
    /// (e.g. `https://sync.example.com`).
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// Returns the server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post_json<Req, Res>(&self, endpoint: &str, request: &Req) -> SyncResult<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let body = encode(request)?;
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url, body)
            .map_err(SyncError::transport_retryable)?;
        Ok(decode(&response)?)
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.post_json("/sync/push", request)
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.post_json("/sync/pull", request)
    }

    fn check_status(&self) -> SyncResult<StatusResponse> {
        let url = format!("{}/sync/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .map_err(SyncError::transport_retryable)?;
        Ok(decode(&response)?)
    }
}
