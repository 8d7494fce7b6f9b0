//! ZabbixBackend - MonitoringBackend implementation over the Zabbix API

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;
use url::Url;

use statmap_core::{
    canonicalize, BackendError, BackendResult, BackendSettings, ConfigFormat, ConfigOption,
    ConfigSchema, MonitoringBackend, ObjectKind, ObjectListing, QueryOptions, ServiceKey, State,
    StatusFilter, StatusRecord,
};

use crate::rpc::RpcClient;
use crate::session::SessionCache;

/// Driver for one configured Zabbix backend.
///
/// Hosts are resolved with a single batched `host.get` per query; trigger
/// ("service") lookups need per-key parameters, so `service_state` issues
/// one `trigger.get` per requested key, as the upstream API dictates.
pub struct ZabbixBackend {
    backend_id: String,
    rpc: RpcClient,
    session: SessionCache,
    user: String,
    pass: String,
}

impl ZabbixBackend {
    /// Static declaration of this driver's configuration options,
    /// consumed by the configuration loader at startup
    pub fn config_schema() -> ConfigSchema {
        ConfigSchema {
            backend_type: "zabbix",
            options: vec![
                ConfigOption {
                    key: "url",
                    required: true,
                    default: Some("http://localhost/zabbix/api_jsonrpc.php"),
                    format: ConfigFormat::Url,
                },
                ConfigOption {
                    key: "login",
                    required: true,
                    default: Some("Admin"),
                    format: ConfigFormat::Text,
                },
                ConfigOption {
                    key: "pass",
                    required: true,
                    default: Some("zabbix"),
                    format: ConfigFormat::Secret,
                },
            ],
        }
    }

    /// Build a driver from a validated configuration section.
    ///
    /// # Errors
    /// Returns `BackendError::Configuration` when the section fails schema
    /// validation. Validation is eager; nothing is deferred to query time.
    pub fn from_settings(backend_id: &str, settings: &BackendSettings) -> BackendResult<Self> {
        let schema = Self::config_schema();
        schema.validate(settings)?;

        let endpoint = schema.resolve(settings, "url").ok_or_else(|| {
            BackendError::Configuration("option 'url' did not resolve".to_string())
        })?;
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| BackendError::Configuration(format!("invalid endpoint URL: {}", e)))?;
        let user = schema.resolve(settings, "login").ok_or_else(|| {
            BackendError::Configuration("option 'login' did not resolve".to_string())
        })?;
        let pass = schema.resolve(settings, "pass").ok_or_else(|| {
            BackendError::Configuration("option 'pass' did not resolve".to_string())
        })?;

        Ok(Self::new(backend_id, RpcClient::new(endpoint)?, user, pass))
    }

    /// Build a driver around an existing RPC client
    pub fn new(
        backend_id: &str,
        rpc: RpcClient,
        user: impl Into<String>,
        pass: impl Into<String>,
    ) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            rpc,
            session: SessionCache::new(),
            user: user.into(),
            pass: pass.into(),
        }
    }

    /// Call a method with the session token attached. On an auth-rejected
    /// reply the driver re-authenticates and retries the call exactly once;
    /// a second failure surfaces as `Unavailable`.
    async fn authed_call(&self, method: &str, params: &Value) -> BackendResult<Value> {
        let token = self
            .session
            .token(&self.rpc, &self.user, &self.pass)
            .await
            .map_err(BackendError::from)?;

        match self.rpc.call(method, params, Some(&token)).await {
            Ok(result) => Ok(result),
            Err(err) if err.is_auth_rejected() => {
                warn!(method, backend_id = %self.backend_id, "session rejected, re-authenticating");
                self.session.invalidate().await;
                let token = self
                    .session
                    .token(&self.rpc, &self.user, &self.pass)
                    .await
                    .map_err(BackendError::from)?;
                self.rpc
                    .call(method, params, Some(&token))
                    .await
                    .map_err(BackendError::from)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn trigger_record(host: &str, row: &Value) -> StatusRecord {
        let (state, description) =
            normalize_trigger_axes(int_field(row, "state"), int_field(row, "value"));
        let mut record = StatusRecord::new(state, description);

        let trigger_id = str_field(row, "triggerid").unwrap_or_default();
        let trigger_description = str_field(row, "description").unwrap_or_default();
        record.display_name = canonicalize(&format!("{}: {}", trigger_id, trigger_description));
        record.host_name = Some(host.to_string());
        record.acknowledged = Some(false);
        record.in_downtime = Some(false);
        record.last_check = int_field_opt(row, "lastchange");
        record.last_state_change = int_field_opt(row, "lastchange");
        record.plugin_output = str_field(row, "error").filter(|s| !s.is_empty());
        record.long_plugin_output = str_field(row, "comments").filter(|s| !s.is_empty());
        record
    }
}

#[async_trait]
impl MonitoringBackend for ZabbixBackend {
    fn backend_id(&self) -> &str {
        &self.backend_id
    }

    async fn list_objects(
        &self,
        kind: ObjectKind,
        name1_pattern: &str,
        _name2_pattern: &str,
    ) -> BackendResult<Vec<ObjectListing>> {
        match kind {
            ObjectKind::Host => {
                let result = self
                    .authed_call("host.get", &json!({ "output": "extend" }))
                    .await?;
                Ok(rows(&result)
                    .iter()
                    .filter_map(|row| {
                        let host = str_field(row, "host")?;
                        let name = str_field(row, "name").unwrap_or_else(|| host.clone());
                        Some(ObjectListing {
                            key: host,
                            name1: name,
                            name2: None,
                        })
                    })
                    .collect())
            }
            ObjectKind::Hostgroup => {
                let result = self
                    .authed_call("hostgroup.get", &json!({ "output": "extend" }))
                    .await?;
                Ok(rows(&result)
                    .iter()
                    .filter_map(|row| {
                        let name = str_field(row, "name")?;
                        Some(ObjectListing {
                            key: name.clone(),
                            name1: name.clone(),
                            name2: Some(name),
                        })
                    })
                    .collect())
            }
            ObjectKind::Servicegroup => {
                let result = self
                    .authed_call("application.get", &json!({ "output": "extend" }))
                    .await?;
                Ok(rows(&result)
                    .iter()
                    .filter_map(|row| {
                        let name = str_field(row, "name")?;
                        Some(ObjectListing {
                            key: name.clone(),
                            name1: name.clone(),
                            name2: Some(name),
                        })
                    })
                    .collect())
            }
            ObjectKind::Service => {
                let result = self
                    .authed_call(
                        "trigger.get",
                        &json!({
                            "output": ["triggerid", "description", "priority", "lastchange"],
                            "filter": { "host": name1_pattern },
                            "sortfield": "priority",
                            "sortorder": "DESC",
                            "monitored": "1",
                            "expandDescription": "1",
                        }),
                    )
                    .await?;
                Ok(rows(&result)
                    .iter()
                    .filter_map(|row| {
                        let trigger_id = str_field(row, "triggerid")?;
                        let description = str_field(row, "description").unwrap_or_default();
                        let name = canonicalize(&format!("{}: {}", trigger_id, description));
                        Some(ObjectListing {
                            key: name.clone(),
                            name1: name.clone(),
                            name2: Some(name),
                        })
                    })
                    .collect())
            }
        }
    }

    async fn host_state(
        &self,
        keys: &[String],
        _options: &QueryOptions,
        _filter: Option<&StatusFilter>,
    ) -> BackendResult<HashMap<String, StatusRecord>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        // One batched lookup for the whole key set
        let result = self
            .authed_call(
                "host.get",
                &json!({
                    "output": ["hostid", "host", "status", "snmp_available", "available"],
                    "filter": { "host": keys },
                }),
            )
            .await?;

        let mut out = HashMap::new();
        for row in rows(&result) {
            let host = match str_field(row, "host") {
                Some(h) => h,
                None => continue,
            };
            let (state, description) = normalize_host_axes(
                int_field(row, "status"),
                int_field(row, "snmp_available"),
                int_field(row, "available"),
            );
            let mut record = StatusRecord::new(state, description);
            record.display_name = canonicalize(&host);
            record.acknowledged = Some(false);
            record.in_downtime = Some(false);
            out.insert(host, record);
        }
        Ok(out)
    }

    async fn service_state(
        &self,
        keys: &[String],
        _options: &QueryOptions,
        filter: Option<&StatusFilter>,
    ) -> BackendResult<HashMap<String, Vec<StatusRecord>>> {
        let mut out = HashMap::new();

        for key in keys {
            let (host, params) = match ServiceKey::parse(key) {
                ServiceKey::Single {
                    host, service_id, ..
                } => {
                    let params = json!({
                        "output": "extend",
                        "triggerids": service_id,
                        "filter": { "host": &host },
                        "selectFunctions": "extend",
                        "sortfield": "priority",
                        "sortorder": "DESC",
                        "monitored": "1",
                        "expandDescription": "1",
                    });
                    (host, params)
                }
                ServiceKey::AllOfHost { host } => {
                    let params = json!({
                        "output": "extend",
                        "filter": { "host": &host },
                        "selectFunctions": "extend",
                        "sortfield": "priority",
                        "sortorder": "DESC",
                        "monitored": "1",
                        "expandDescription": "1",
                        "min_severity": "3",
                        "only_true": "1",
                    });
                    (host, params)
                }
            };

            let records = match self.authed_call("trigger.get", &params).await {
                Ok(result) => rows(&result)
                    .iter()
                    .map(|row| Self::trigger_record(&host, row))
                    .filter(|record| filter.map(|f| f.allows(record.state)).unwrap_or(true))
                    .collect(),
                // One failing object lookup must not abort the whole batch
                Err(err) if err.is_degradable() => {
                    warn!(backend_id = %self.backend_id, key = %key, error = %err,
                        "service lookup failed, degrading to unknown");
                    let mut record =
                        StatusRecord::unknown(format!("Zabbix query failed: {}", err));
                    record.display_name = canonicalize(key);
                    record.host_name = Some(host.clone());
                    vec![record]
                }
                Err(err) => return Err(err),
            };
            out.insert(key.clone(), records);
        }

        Ok(out)
    }

    async fn host_groups(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<String>>> {
        let result = self
            .authed_call(
                "host.get",
                &json!({
                    "output": ["hostid", "host"],
                    "filter": { "host": keys },
                    "selectGroups": "extend",
                }),
            )
            .await?;

        let mut out = HashMap::new();
        for row in rows(&result) {
            let host = match str_field(row, "host") {
                Some(h) => h,
                None => continue,
            };
            let groups = row
                .get("groups")
                .and_then(Value::as_array)
                .map(|groups| {
                    groups
                        .iter()
                        .filter_map(|g| str_field(g, "name"))
                        .collect()
                })
                .unwrap_or_default();
            out.insert(host, groups);
        }
        Ok(out)
    }

    async fn service_groups(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<String>>> {
        // Zabbix models servicegroups as applications, keyed by host id
        let result = self
            .authed_call(
                "application.get",
                &json!({
                    "output": "extend",
                    "hostids": keys,
                }),
            )
            .await?;

        let mut out: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows(&result) {
            let host_id = match str_field(row, "hostid") {
                Some(h) => h,
                None => continue,
            };
            if let Some(name) = str_field(row, "name") {
                out.entry(host_id).or_default().push(name);
            }
        }
        Ok(out)
    }

    // State-count aggregates and hierarchy queries keep the trait defaults:
    // the Zabbix API cannot compute them server-side, and the contract is an
    // empty mapping rather than a client-side computation.
}

/// Rows of a list-shaped RPC result; a non-array result is an empty slice
fn rows(result: &Value) -> &[Value] {
    result.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Numeric field that Zabbix serializes as either a number or a string.
/// Anything unparseable becomes -1, which feeds the unmapped arm of the
/// normalization tables.
fn int_field(row: &Value, key: &str) -> i64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(-1),
        Some(Value::String(s)) => s.parse().unwrap_or(-1),
        _ => -1,
    }
}

fn int_field_opt(row: &Value, key: &str) -> Option<i64> {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn str_field(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Map the host status axes to one canonical state.
///
/// From the Zabbix API:
///   status         - whether the host is monitored (0 yes, 1 no)
///   snmp_available - SNMP availability (0 unknown, 1 ok, 2 problem)
///   available      - agent availability (0 unknown, 1 ok, 2 problem)
///
/// The table is total: "host not monitored" overrides the availability
/// axes, and any tuple outside the known matrix maps to UNKNOWN with a
/// description naming the raw values.
fn normalize_host_axes(status: i64, snmp_available: i64, available: i64) -> (State, String) {
    if status == 1 {
        return (State::Unknown, "Host not monitored".to_string());
    }
    if status != 0 {
        return (
            State::Unknown,
            format!(
                "Unmapped availability tuple ({}/{}/{})",
                status, snmp_available, available
            ),
        );
    }
    let (state, description) = match (snmp_available, available) {
        (0, 0) => (State::Unknown, "Not monitored by SNMP or Agent"),
        (0, 1) => (State::Ok, "Agent is OK"),
        (0, 2) => (State::Down, "Agent is DOWN"),
        (1, 0) => (State::Ok, "SNMP is OK"),
        (1, 1) => (State::Ok, "SNMP is OK, Agent is OK"),
        (1, 2) => (State::Ok, "SNMP is OK, Agent is DOWN"),
        (2, 0) => (State::Down, "SNMP is DOWN"),
        (2, 1) => (State::Ok, "SNMP is DOWN, Agent is OK"),
        (2, 2) => (State::Down, "SNMP is DOWN, Agent is DOWN"),
        _ => {
            return (
                State::Unknown,
                format!(
                    "Unmapped availability tuple ({}/{}/{})",
                    status, snmp_available, available
                ),
            )
        }
    };
    (state, description.to_string())
}

/// Map the trigger status axes to one canonical state.
///
///   state - trigger state (0 up to date, 1 unknown)
///   value - trigger value (0 ok, 1 problem)
fn normalize_trigger_axes(state: i64, value: i64) -> (State, String) {
    let (state, description) = match (state, value) {
        (0, 0) => (State::Ok, "Service is OK"),
        (0, 1) => (State::Critical, "Service is in Problem state"),
        (1, 0) | (1, 1) => (State::Unknown, "Service state unknown"),
        _ => {
            return (
                State::Unknown,
                format!("Unmapped service state tuple ({}/{})", state, value),
            )
        }
    };
    (state, description.to_string())
}
