//! Backend registry - resolves configured backend ids to live drivers

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use statmap_core::{BackendError, BackendResult, BackendSettings, MonitoringBackend};
use statmap_zabbix::ZabbixBackend;

/// Resolves a configuration id to a live driver instance.
///
/// Drivers are instantiated at most once per id and cached for the process
/// lifetime; the construction lock guarantees at-most-one construction even
/// under concurrent first use. The configuration map is captured at startup
/// and immutable afterwards.
pub struct BackendRegistry {
    configs: HashMap<String, BackendSettings>,
    instances: Mutex<HashMap<String, Arc<dyn MonitoringBackend>>>,
}

impl BackendRegistry {
    pub fn new(configs: HashMap<String, BackendSettings>) -> Self {
        Self {
            configs,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Register an already-constructed driver under its own id.
    ///
    /// Used by callers that assemble drivers directly (tests, embedded
    /// setups); configured ids resolve through `resolve`.
    pub async fn insert(&self, backend: Arc<dyn MonitoringBackend>) {
        let id = backend.backend_id().to_string();
        info!(backend_id = %id, "registering backend driver");
        self.instances.lock().await.insert(id, backend);
    }

    /// Resolve a backend id to its driver, constructing it on first use.
    ///
    /// # Errors
    /// Returns `BackendError::Configuration` when the id has no matching
    /// configuration section, names an unknown driver type, or fails the
    /// driver's own schema validation.
    pub async fn resolve(&self, id: &str) -> BackendResult<Arc<dyn MonitoringBackend>> {
        let mut instances = self.instances.lock().await;
        if let Some(backend) = instances.get(id) {
            return Ok(backend.clone());
        }

        let settings = self.configs.get(id).ok_or_else(|| {
            BackendError::Configuration(format!("no configuration section for backend '{}'", id))
        })?;

        // Closed set of driver variants; an unknown type is a fatal
        // configuration error, not a silent fallback.
        let backend: Arc<dyn MonitoringBackend> = match settings.backend_type.as_str() {
            "zabbix" => Arc::new(ZabbixBackend::from_settings(id, settings)?),
            other => {
                return Err(BackendError::Configuration(format!(
                    "unknown backend type '{}' for backend '{}'",
                    other, id
                )))
            }
        };

        info!(backend_id = %id, backend_type = %settings.backend_type, "instantiated backend driver");
        instances.insert(id.to_string(), backend.clone());
        Ok(backend)
    }
}
