//! MonitoringBackend trait - the capability contract every driver implements

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};
use crate::keys::ObjectKind;
use crate::status::{StateCounts, StatusRecord};

/// One row of a `list_objects` reply, used for UI object pickers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectListing {
    /// Backend-local object key
    pub key: String,
    /// Primary display name
    pub name1: String,
    /// Secondary display name, when the kind has one
    pub name2: Option<String>,
}

/// Per-call query knobs passed through to the driver
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Only consider hard states; drivers whose backend has no soft/hard
    /// distinction ignore this
    pub only_hard_states: bool,
}

/// Per-object result filter applied by drivers and the aggregation layer
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatusFilter {
    /// Drop service records whose state ranks below this severity floor
    pub min_severity: Option<crate::status::State>,
}

impl StatusFilter {
    /// Whether a record in the given state passes the filter
    pub fn allows(&self, state: crate::status::State) -> bool {
        match self.min_severity {
            Some(floor) => state.severity_rank() >= floor.severity_rank(),
            None => true,
        }
    }
}

/// The core trait every monitoring backend driver implements.
///
/// One driver exists per external monitoring system (Zabbix, a
/// Nagios-compatible core, ...). Drivers own protocol details, session
/// management and request batching; callers only see canonical records.
///
/// Drivers may implement a subset of the capability set. Unimplemented
/// operations keep the default implementation, which returns an explicit
/// empty/`Unsupported` result - never a panic, and the aggregation layer
/// never surfaces it as a hard failure.
///
/// Every query operation is read-only and deterministic relative to its
/// inputs modulo backend staleness: the same inputs against an unchanged
/// remote state yield the same canonical output.
#[async_trait]
pub trait MonitoringBackend: Send + Sync {
    /// Configured identifier of this backend instance
    fn backend_id(&self) -> &str;

    /// List objects of one kind, optionally narrowed by name patterns.
    /// Used to populate UI object pickers.
    async fn list_objects(
        &self,
        kind: ObjectKind,
        name1_pattern: &str,
        name2_pattern: &str,
    ) -> BackendResult<Vec<ObjectListing>> {
        let _ = (kind, name1_pattern, name2_pattern);
        Err(BackendError::Unsupported("list_objects"))
    }

    /// State of the given hosts, one canonical record per found key.
    ///
    /// Drivers must prefer one batched remote call for the whole key set
    /// whenever the backend supports bulk lookup; per-key calls multiply
    /// round-trip latency linearly with object count.
    async fn host_state(
        &self,
        keys: &[String],
        options: &QueryOptions,
        filter: Option<&StatusFilter>,
    ) -> BackendResult<HashMap<String, StatusRecord>>;

    /// State of the services addressed by the given keys. A host key yields
    /// 0..n records; a key addressing one specific service yields a
    /// one-element sequence.
    async fn service_state(
        &self,
        keys: &[String],
        options: &QueryOptions,
        filter: Option<&StatusFilter>,
    ) -> BackendResult<HashMap<String, Vec<StatusRecord>>>;

    /// Group memberships of the given hosts
    async fn host_groups(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<String>>> {
        let _ = keys;
        Err(BackendError::Unsupported("host_groups"))
    }

    /// Service group memberships of the given hosts
    async fn service_groups(&self, keys: &[String]) -> BackendResult<HashMap<String, Vec<String>>> {
        let _ = keys;
        Err(BackendError::Unsupported("service_groups"))
    }

    /// Aggregate state counts per hostgroup. Backends that cannot compute
    /// aggregates efficiently return an empty mapping; the counts are never
    /// computed client-side by default.
    async fn hostgroup_state_counts(
        &self,
        keys: &[String],
    ) -> BackendResult<HashMap<String, StateCounts>> {
        let _ = keys;
        Ok(HashMap::new())
    }

    /// Aggregate state counts per servicegroup; same contract as
    /// `hostgroup_state_counts`
    async fn servicegroup_state_counts(
        &self,
        keys: &[String],
    ) -> BackendResult<HashMap<String, StateCounts>> {
        let _ = keys;
        Ok(HashMap::new())
    }

    /// Host names with no parent defined (hierarchy roots)
    async fn host_names_without_parent(&self) -> BackendResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Direct children of the given host in the parent/child hierarchy
    async fn direct_child_names(&self, host_name: &str) -> BackendResult<Vec<String>> {
        let _ = host_name;
        Ok(Vec::new())
    }

    /// Direct parents of the given host in the parent/child hierarchy
    async fn direct_parent_names(&self, host_name: &str) -> BackendResult<Vec<String>> {
        let _ = host_name;
        Ok(Vec::new())
    }
}

impl std::fmt::Debug for dyn MonitoringBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringBackend")
            .field("backend_id", &self.backend_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::State;

    struct Minimal;

    #[async_trait]
    impl MonitoringBackend for Minimal {
        fn backend_id(&self) -> &str {
            "minimal"
        }

        async fn host_state(
            &self,
            keys: &[String],
            _options: &QueryOptions,
            _filter: Option<&StatusFilter>,
        ) -> BackendResult<HashMap<String, StatusRecord>> {
            Ok(keys
                .iter()
                .map(|k| (k.clone(), StatusRecord::new(State::Up, "up")))
                .collect())
        }

        async fn service_state(
            &self,
            _keys: &[String],
            _options: &QueryOptions,
            _filter: Option<&StatusFilter>,
        ) -> BackendResult<HashMap<String, Vec<StatusRecord>>> {
            Ok(HashMap::new())
        }
    }

    #[tokio::test]
    async fn unimplemented_capabilities_return_empty_or_unsupported() {
        let backend = Minimal;
        assert!(matches!(
            backend.list_objects(ObjectKind::Host, "", "").await,
            Err(BackendError::Unsupported("list_objects"))
        ));
        assert!(backend
            .hostgroup_state_counts(&["g1".to_string()])
            .await
            .unwrap()
            .is_empty());
        assert!(backend.host_names_without_parent().await.unwrap().is_empty());
        assert!(backend
            .direct_child_names("web01")
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn filter_without_floor_allows_everything() {
        let filter = StatusFilter::default();
        assert!(filter.allows(State::Ok));
        assert!(filter.allows(State::Critical));
    }

    #[test]
    fn filter_with_floor_drops_lower_severities() {
        let filter = StatusFilter {
            min_severity: Some(State::Warning),
        };
        assert!(!filter.allows(State::Ok));
        assert!(!filter.allows(State::Unknown));
        assert!(filter.allows(State::Warning));
        assert!(filter.allows(State::Critical));
    }
}
