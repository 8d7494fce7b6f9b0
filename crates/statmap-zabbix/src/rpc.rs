//! JSON-RPC transport for the Zabbix API

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use statmap_core::BackendError;

/// Zabbix expects this exact content type on API calls
const CONTENT_TYPE_JSON_RPC: &str = "application/json-rpc";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors a single JSON-RPC call can produce.
///
/// Kept separate from `BackendError` so the driver can inspect
/// auth-rejected replies before converting; everything a caller outside
/// this crate sees is the converted `BackendError::Unavailable`.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Network-level failure: unreachable endpoint, timeout, non-success
    /// HTTP status, unparseable body
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote API replied with an `error` member
    #[error("remote error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<String>,
    },
}

impl RpcError {
    /// Whether this is the remote API rejecting the session token.
    ///
    /// Zabbix reports expired or invalid sessions as an RPC error whose
    /// message or data mentions re-login / authorization; the exact code
    /// varies across API versions, so the text is what we match on.
    pub fn is_auth_rejected(&self) -> bool {
        match self {
            RpcError::Remote { message, data, .. } => {
                let text = match data {
                    Some(d) => format!("{} {}", message, d).to_ascii_lowercase(),
                    None => message.to_ascii_lowercase(),
                };
                text.contains("re-login")
                    || text.contains("session terminated")
                    || text.contains("not authoris")
                    || text.contains("not authoriz")
            }
            RpcError::Transport(_) => false,
        }
    }
}

impl From<RpcError> for BackendError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Transport(message) => BackendError::Unavailable {
                message,
                code: None,
            },
            RpcError::Remote { code, message, data } => BackendError::Unavailable {
                message: match data {
                    Some(d) => format!("{} ({})", message, d),
                    None => message,
                },
                code: Some(code),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a Value,
    id: u64,
    auth: Option<&'a str>,
}

/// JSON-RPC client for one Zabbix endpoint.
///
/// Request ids increment monotonically per client; they exist purely for
/// protocol correlation and imply no ordering guarantee.
#[derive(Debug)]
pub struct RpcClient {
    http: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a client with the default timeouts.
    ///
    /// # Errors
    /// Returns `BackendError::Configuration` if the HTTP client cannot
    /// be built.
    pub fn new(endpoint: Url) -> Result<Self, BackendError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a client with custom request and connection timeouts
    pub fn with_timeout(
        endpoint: Url,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| BackendError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint this client talks to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Issue one JSON-RPC call.
    ///
    /// An empty-but-successful `result` is not an error; it comes back as
    /// the (possibly empty) `Value`. A reply carrying an `error` member
    /// surfaces as `RpcError::Remote` with the remote code and message.
    pub async fn call(
        &self,
        method: &str,
        params: &Value,
        auth: Option<&str>,
    ) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
            auth,
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|e| RpcError::Transport(format!("failed to encode request: {}", e)))?;

        debug!(method, id, "zabbix rpc call");

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_JSON_RPC)
            .body(payload)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RpcError::Transport(format!(
                "HTTP status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcError::Transport(format!("invalid JSON-RPC body: {}", e)))?;

        if let Some(error) = body.get("error") {
            return Err(RpcError::Remote {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified remote error")
                    .to_string(),
                data: error
                    .get("data")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }

        match body.get("result") {
            Some(result) => Ok(result.clone()),
            None => Err(RpcError::Transport(
                "reply carried neither result nor error".to_string(),
            )),
        }
    }
}
