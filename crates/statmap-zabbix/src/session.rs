//! Session token cache for the Zabbix API.
//!
//! Zabbix hands out short-lived session tokens via `user.login`; the token
//! is attached to every subsequent call. The cache holds its lock across
//! the login round-trip, so only one refresh is ever in flight per driver
//! and concurrent callers awaiting it share the result.

use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;

use crate::rpc::{RpcClient, RpcError};

/// Transient auth token cache, one per driver instance
#[derive(Debug, Default)]
pub struct SessionCache {
    token: Mutex<Option<String>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached session token, logging in first if there is none
    pub async fn token(
        &self,
        rpc: &RpcClient,
        user: &str,
        pass: &str,
    ) -> Result<String, RpcError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let result = rpc
            .call(
                "user.login",
                &json!({ "user": user, "password": pass }),
                None,
            )
            .await?;

        let token = result
            .as_str()
            .ok_or_else(|| {
                RpcError::Transport("user.login returned a non-string session id".to_string())
            })?
            .to_string();

        info!("zabbix session established");
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token; the next `token` call re-authenticates
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }
}
