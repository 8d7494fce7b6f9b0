//! Integration tests for the aggregation facade.
//!
//! Mock backends with injectable latency and failure drive the facade
//! through its reliability contract: order preservation, partial-failure
//! degradation, timeout bounding and not-found markers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_test::assert_ok;

use statmap_aggregate::{BackendRegistry, ObjectStatus, StatusAggregator};
use statmap_core::{
    BackendError, BackendResult, MonitoringBackend, ObjectKind, ObjectRef, QueryOptions, State,
    StateCounts, StatusFilter, StatusRecord,
};

/// Mock backend with injectable latency and failure
struct MockBackend {
    id: String,
    delay: Option<Duration>,
    fail: bool,
    hosts: HashMap<String, StatusRecord>,
    services: HashMap<String, Vec<StatusRecord>>,
    group_counts: HashMap<String, StateCounts>,
}

impl MockBackend {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            delay: None,
            fail: false,
            hosts: HashMap::new(),
            services: HashMap::new(),
            group_counts: HashMap::new(),
        }
    }

    fn with_host(mut self, name: &str, state: State) -> Self {
        let mut record = StatusRecord::new(state, format!("{} reported by {}", state, self.id));
        record.display_name = name.to_string();
        self.hosts.insert(name.to_string(), record);
        self
    }

    fn with_service(mut self, key: &str, states: &[State]) -> Self {
        let records = states
            .iter()
            .map(|&state| {
                let mut record = StatusRecord::new(state, state.to_string());
                record.display_name = key.to_string();
                record.host_name = Some(key.to_string());
                record
            })
            .collect();
        self.services.insert(key.to_string(), records);
        self
    }

    fn with_group(mut self, name: &str, members: &[State]) -> Self {
        let mut counts = StateCounts::new();
        for &state in members {
            counts.add(state);
        }
        self.group_counts.insert(name.to_string(), counts);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    async fn simulate(&self) -> BackendResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(BackendError::unavailable("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl MonitoringBackend for MockBackend {
    fn backend_id(&self) -> &str {
        &self.id
    }

    async fn host_state(
        &self,
        keys: &[String],
        _options: &QueryOptions,
        _filter: Option<&StatusFilter>,
    ) -> BackendResult<HashMap<String, StatusRecord>> {
        self.simulate().await?;
        Ok(keys
            .iter()
            .filter_map(|key| self.hosts.get(key).map(|r| (key.clone(), r.clone())))
            .collect())
    }

    async fn service_state(
        &self,
        keys: &[String],
        _options: &QueryOptions,
        filter: Option<&StatusFilter>,
    ) -> BackendResult<HashMap<String, Vec<StatusRecord>>> {
        self.simulate().await?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.services.get(key).map(|records| {
                    let records = records
                        .iter()
                        .filter(|r| filter.map(|f| f.allows(r.state)).unwrap_or(true))
                        .cloned()
                        .collect();
                    (key.clone(), records)
                })
            })
            .collect())
    }

    async fn hostgroup_state_counts(
        &self,
        keys: &[String],
    ) -> BackendResult<HashMap<String, StateCounts>> {
        self.simulate().await?;
        Ok(keys
            .iter()
            .filter_map(|key| self.group_counts.get(key).map(|c| (key.clone(), c.clone())))
            .collect())
    }
}

async fn aggregator_with(backends: Vec<MockBackend>) -> StatusAggregator {
    let registry = Arc::new(BackendRegistry::new(HashMap::new()));
    for backend in backends {
        registry.insert(Arc::new(backend)).await;
    }
    StatusAggregator::new(registry)
}

fn host_key(backend: &str, name: &str) -> ObjectRef {
    ObjectRef::new(backend, ObjectKind::Host, name)
}

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn merged_output_preserves_caller_key_order() {
    // The slow backend finishes last; its records must still come first
    let aggregator = aggregator_with(vec![
        MockBackend::new("slow")
            .with_delay(Duration::from_millis(150))
            .with_host("s1", State::Up)
            .with_host("s2", State::Down),
        MockBackend::new("fast")
            .with_host("f1", State::Up)
            .with_host("f2", State::Up),
    ])
    .await;

    let keys = vec![
        host_key("slow", "s1"),
        host_key("fast", "f1"),
        host_key("slow", "s2"),
        host_key("fast", "f2"),
    ];
    let outcomes = aggregator
        .query_status(&keys, &QueryOptions::default(), None, TIMEOUT)
        .await;

    assert_eq!(outcomes.len(), keys.len());
    let returned: Vec<_> = outcomes.iter().map(|o| o.key.clone()).collect();
    assert_eq!(returned, keys);
    assert_eq!(outcomes[2].records()[0].state, State::Down);
}

#[tokio::test]
async fn failing_backend_degrades_only_its_own_objects() {
    let aggregator = aggregator_with(vec![
        MockBackend::new("good").with_host("h1", State::Up),
        MockBackend::new("bad").failing(),
    ])
    .await;

    let keys = vec![
        host_key("good", "h1"),
        host_key("bad", "h2"),
        host_key("bad", "h3"),
    ];
    let outcomes = aggregator
        .query_status(&keys, &QueryOptions::default(), None, TIMEOUT)
        .await;

    // Exactly one outcome per requested key
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].records()[0].state, State::Up);
    for outcome in &outcomes[1..] {
        let record = &outcome.records()[0];
        assert_eq!(record.state, State::Unknown);
        assert!(record.state_description.contains("bad"));
    }
}

#[tokio::test]
async fn unresolvable_backend_degrades_instead_of_aborting() {
    // No configuration and no inserted instance for "ghost"
    let aggregator =
        aggregator_with(vec![MockBackend::new("good").with_host("h1", State::Ok)]).await;

    let keys = vec![host_key("ghost", "x"), host_key("good", "h1")];
    let outcomes = aggregator
        .query_status(&keys, &QueryOptions::default(), None, TIMEOUT)
        .await;

    assert_eq!(outcomes[0].records()[0].state, State::Unknown);
    assert!(outcomes[0].records()[0].state_description.contains("ghost"));
    assert_eq!(outcomes[1].records()[0].state, State::Ok);
}

#[tokio::test]
async fn timed_out_backend_degrades_within_the_bound() {
    let aggregator = aggregator_with(vec![
        MockBackend::new("stuck")
            .with_delay(Duration::from_secs(30))
            .with_host("h1", State::Up),
        MockBackend::new("fast").with_host("h2", State::Up),
    ])
    .await;

    let keys = vec![host_key("stuck", "h1"), host_key("fast", "h2")];
    let started = Instant::now();
    let outcomes = aggregator
        .query_status(
            &keys,
            &QueryOptions::default(),
            None,
            Duration::from_millis(100),
        )
        .await;

    // Returns within the timeout plus bounded overhead
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(outcomes.len(), 2);
    let record = &outcomes[0].records()[0];
    assert_eq!(record.state, State::Unknown);
    assert!(record.state_description.contains("did not answer"));
    assert_eq!(outcomes[1].records()[0].state, State::Up);
}

#[tokio::test]
async fn missing_objects_get_an_explicit_not_found_marker() {
    let aggregator =
        aggregator_with(vec![MockBackend::new("b1").with_host("h1", State::Up)]).await;

    let keys = vec![host_key("b1", "h1"), host_key("b1", "missing")];
    let outcomes = aggregator
        .query_status(&keys, &QueryOptions::default(), None, TIMEOUT)
        .await;

    assert!(matches!(outcomes[0].status, ObjectStatus::Found(_)));
    assert_eq!(outcomes[1].status, ObjectStatus::NotFound);
}

#[tokio::test]
async fn service_keys_carry_all_records_of_the_host() {
    let aggregator = aggregator_with(vec![MockBackend::new("b1").with_service(
        "web01",
        &[State::Ok, State::Critical, State::Warning],
    )])
    .await;

    let keys = vec![ObjectRef::new("b1", ObjectKind::Service, "web01")];
    let outcomes = aggregator
        .query_status(&keys, &QueryOptions::default(), None, TIMEOUT)
        .await;
    assert_eq!(outcomes[0].records().len(), 3);

    // Severity floor filters through to the driver
    let filter = StatusFilter {
        min_severity: Some(State::Warning),
    };
    let outcomes = aggregator
        .query_status(&keys, &QueryOptions::default(), Some(&filter), TIMEOUT)
        .await;
    assert_eq!(outcomes[0].records().len(), 2);
}

#[tokio::test]
async fn group_keys_summarize_member_counts() {
    let aggregator = aggregator_with(vec![MockBackend::new("b1")
        .with_group("web", &[State::Ok, State::Ok, State::Critical])
        .with_group("db", &[State::Ok])])
    .await;

    let keys = vec![
        ObjectRef::new("b1", ObjectKind::Hostgroup, "web"),
        ObjectRef::new("b1", ObjectKind::Hostgroup, "db"),
        ObjectRef::new("b1", ObjectKind::Hostgroup, "nope"),
    ];
    let outcomes = aggregator
        .query_status(&keys, &QueryOptions::default(), None, TIMEOUT)
        .await;

    assert_eq!(outcomes[0].records()[0].state, State::Critical);
    assert_eq!(outcomes[1].records()[0].state, State::Ok);
    assert_eq!(outcomes[2].status, ObjectStatus::NotFound);
}

#[tokio::test]
async fn unsupported_capabilities_yield_empty_results_not_errors() {
    let aggregator = aggregator_with(vec![MockBackend::new("b1")]).await;

    // MockBackend keeps the trait defaults for listing and servicegroups
    let listing = aggregator
        .list_objects("b1", ObjectKind::Host, "", "")
        .await;
    assert_ok!(&listing);
    assert!(listing.unwrap().is_empty());

    let counts = aggregator.servicegroup_counts("b1", &["g".to_string()]).await;
    assert_ok!(&counts);
    assert!(counts.unwrap().is_empty());
}
