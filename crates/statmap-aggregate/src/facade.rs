//! Aggregation facade - the single query entry point for status consumers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use statmap_core::{
    canonicalize, BackendError, BackendResult, ObjectKind, ObjectListing,
    ObjectRef, QueryOptions, State, StateCounts, StatusFilter, StatusRecord,
};

use crate::registry::BackendRegistry;

/// Resolution of one requested object key. Every requested key yields
/// exactly one of these - never a silent gap.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectStatus {
    /// The backend produced records: exactly one for hosts, 1..n for
    /// service keys addressing a whole host
    Found(Vec<StatusRecord>),
    /// The backend replied, but has no such object
    NotFound,
}

/// One requested key together with its resolution
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub key: ObjectRef,
    pub status: ObjectStatus,
}

impl QueryOutcome {
    /// Records of a found object; empty for not-found markers
    pub fn records(&self) -> &[StatusRecord] {
        match &self.status {
            ObjectStatus::Found(records) => records,
            ObjectStatus::NotFound => &[],
        }
    }
}

/// Fan-out/merge entry point used by all status consumers.
///
/// Partitions a logical query by owning backend, dispatches one concurrent
/// task per partition bounded by the caller's timeout, and merges results
/// preserving the caller-supplied key order. A failing backend degrades its
/// own objects to UNKNOWN; it never blanks the rest of the view.
pub struct StatusAggregator {
    registry: Arc<BackendRegistry>,
}

impl StatusAggregator {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve the status of a set of object keys, possibly spanning
    /// multiple backends.
    ///
    /// The returned sequence has exactly one outcome per requested key, in
    /// the caller's order, independent of which backend answered first.
    pub async fn query_status(
        &self,
        keys: &[ObjectRef],
        options: &QueryOptions,
        filter: Option<&StatusFilter>,
        query_timeout: Duration,
    ) -> Vec<QueryOutcome> {
        // Partition key indexes by owning backend, first-seen order
        let mut partitions: Vec<(String, Vec<usize>)> = Vec::new();
        let mut partition_of: HashMap<&str, usize> = HashMap::new();
        for (index, key) in keys.iter().enumerate() {
            match partition_of.get(key.backend_id.as_str()) {
                Some(&p) => partitions[p].1.push(index),
                None => {
                    partition_of.insert(key.backend_id.as_str(), partitions.len());
                    partitions.push((key.backend_id.clone(), vec![index]));
                }
            }
        }

        // One concurrent task per backend partition
        let mut tasks = Vec::with_capacity(partitions.len());
        for (backend_id, indexes) in partitions {
            let registry = self.registry.clone();
            let partition_keys: Vec<ObjectRef> =
                indexes.iter().map(|&i| keys[i].clone()).collect();
            let options = *options;
            let filter = filter.copied();
            tasks.push(tokio::spawn(async move {
                let result = timeout(
                    query_timeout,
                    query_backend(registry, &partition_keys, options, filter),
                )
                .await;
                (backend_id, indexes, partition_keys, result)
            }));
        }

        let mut slots: Vec<Option<QueryOutcome>> = keys.iter().map(|_| None).collect();
        for task in tasks {
            let (backend_id, indexes, partition_keys, result) = match task.await {
                Ok(output) => output,
                Err(err) => {
                    warn!(error = %err, "backend query task failed to join");
                    continue;
                }
            };
            match result {
                Ok(Ok(statuses)) => {
                    for ((index, key), status) in
                        indexes.into_iter().zip(partition_keys).zip(statuses)
                    {
                        slots[index] = Some(QueryOutcome { key, status });
                    }
                }
                Ok(Err(err)) => {
                    warn!(backend_id = %backend_id, error = %err,
                        "backend query failed, degrading its objects");
                    let description =
                        format!("Backend '{}' unavailable: {}", backend_id, err);
                    for (index, key) in indexes.into_iter().zip(partition_keys) {
                        slots[index] = Some(degraded(key, description.clone()));
                    }
                }
                Err(_elapsed) => {
                    warn!(backend_id = %backend_id, timeout_ms = query_timeout.as_millis() as u64,
                        "backend query timed out, degrading its objects");
                    let description = format!(
                        "Backend '{}' did not answer within {}ms",
                        backend_id,
                        query_timeout.as_millis()
                    );
                    for (index, key) in indexes.into_iter().zip(partition_keys) {
                        slots[index] = Some(degraded(key, description.clone()));
                    }
                }
            }
        }

        // Exactly one outcome per requested key, caller's order
        keys.iter()
            .enumerate()
            .map(|(index, key)| {
                slots[index].take().unwrap_or_else(|| {
                    degraded(
                        key.clone(),
                        format!("Backend '{}' produced no result", key.backend_id),
                    )
                })
            })
            .collect()
    }

    /// Listing pass-through for UI object pickers; unsupported backends
    /// yield an empty listing.
    pub async fn list_objects(
        &self,
        backend_id: &str,
        kind: ObjectKind,
        name1_pattern: &str,
        name2_pattern: &str,
    ) -> BackendResult<Vec<ObjectListing>> {
        let backend = self.registry.resolve(backend_id).await?;
        match backend.list_objects(kind, name1_pattern, name2_pattern).await {
            Err(BackendError::Unsupported(operation)) => {
                debug!(backend_id = %backend_id, operation, "capability unsupported, empty listing");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Hostgroup state-count pass-through for summary displays
    pub async fn hostgroup_counts(
        &self,
        backend_id: &str,
        keys: &[String],
    ) -> BackendResult<HashMap<String, StateCounts>> {
        let backend = self.registry.resolve(backend_id).await?;
        match backend.hostgroup_state_counts(keys).await {
            Err(BackendError::Unsupported(operation)) => {
                debug!(backend_id = %backend_id, operation, "capability unsupported, empty counts");
                Ok(HashMap::new())
            }
            other => other,
        }
    }

    /// Servicegroup state-count pass-through for summary displays
    pub async fn servicegroup_counts(
        &self,
        backend_id: &str,
        keys: &[String],
    ) -> BackendResult<HashMap<String, StateCounts>> {
        let backend = self.registry.resolve(backend_id).await?;
        match backend.servicegroup_state_counts(keys).await {
            Err(BackendError::Unsupported(operation)) => {
                debug!(backend_id = %backend_id, operation, "capability unsupported, empty counts");
                Ok(HashMap::new())
            }
            other => other,
        }
    }
}

/// Query one backend for one partition of keys; the returned vector is
/// aligned with the partition's key order.
async fn query_backend(
    registry: Arc<BackendRegistry>,
    keys: &[ObjectRef],
    options: QueryOptions,
    filter: Option<StatusFilter>,
) -> BackendResult<Vec<ObjectStatus>> {
    let backend_id = match keys.first() {
        Some(key) => key.backend_id.as_str(),
        None => return Ok(Vec::new()),
    };
    let backend = registry.resolve(backend_id).await?;

    let mut host_keys: Vec<(usize, String)> = Vec::new();
    let mut service_keys: Vec<(usize, String)> = Vec::new();
    let mut hostgroup_keys: Vec<(usize, String)> = Vec::new();
    let mut servicegroup_keys: Vec<(usize, String)> = Vec::new();
    for (index, key) in keys.iter().enumerate() {
        match key.kind {
            ObjectKind::Host => host_keys.push((index, key.key.clone())),
            ObjectKind::Service => service_keys.push((index, key.key.clone())),
            ObjectKind::Hostgroup => hostgroup_keys.push((index, key.key.clone())),
            ObjectKind::Servicegroup => servicegroup_keys.push((index, key.key.clone())),
        }
    }

    let mut statuses: Vec<Option<ObjectStatus>> = keys.iter().map(|_| None).collect();

    if !host_keys.is_empty() {
        let names: Vec<String> = host_keys.iter().map(|(_, name)| name.clone()).collect();
        let mut map = backend
            .host_state(&names, &options, filter.as_ref())
            .await?;
        for (index, name) in host_keys {
            statuses[index] = Some(match map.remove(&name) {
                Some(record) => ObjectStatus::Found(vec![record]),
                None => ObjectStatus::NotFound,
            });
        }
    }

    if !service_keys.is_empty() {
        let names: Vec<String> = service_keys.iter().map(|(_, name)| name.clone()).collect();
        let mut map = backend
            .service_state(&names, &options, filter.as_ref())
            .await?;
        for (index, name) in service_keys {
            statuses[index] = Some(match map.remove(&name) {
                Some(records) if !records.is_empty() => ObjectStatus::Found(records),
                _ => ObjectStatus::NotFound,
            });
        }
    }

    if !hostgroup_keys.is_empty() {
        let names: Vec<String> = hostgroup_keys.iter().map(|(_, name)| name.clone()).collect();
        let counts = backend.hostgroup_state_counts(&names).await?;
        for (index, name) in hostgroup_keys {
            statuses[index] = Some(group_status(&name, counts.get(&name)));
        }
    }

    if !servicegroup_keys.is_empty() {
        let names: Vec<String> = servicegroup_keys
            .iter()
            .map(|(_, name)| name.clone())
            .collect();
        let counts = backend.servicegroup_state_counts(&names).await?;
        for (index, name) in servicegroup_keys {
            statuses[index] = Some(group_status(&name, counts.get(&name)));
        }
    }

    Ok(statuses
        .into_iter()
        .map(|status| status.unwrap_or(ObjectStatus::NotFound))
        .collect())
}

/// Summarize a group's member counts into one record carrying the worst
/// member state per the severity policy table.
fn group_status(name: &str, counts: Option<&StateCounts>) -> ObjectStatus {
    const ALL_STATES: [State; 7] = [
        State::Up,
        State::Ok,
        State::Warning,
        State::Critical,
        State::Down,
        State::Unknown,
        State::Pending,
    ];

    let counts = match counts {
        Some(counts) if counts.total() > 0 => counts,
        _ => return ObjectStatus::NotFound,
    };

    let worst = ALL_STATES
        .iter()
        .copied()
        .filter(|state| counts.get(*state) > 0)
        .max_by_key(|state| state.severity_rank())
        .unwrap_or(State::Unknown);

    let mut record = StatusRecord::new(
        worst,
        format!(
            "{} of {} members in state {}",
            counts.get(worst),
            counts.total(),
            worst
        ),
    );
    record.display_name = canonicalize(name);
    ObjectStatus::Found(vec![record])
}

fn degraded(key: ObjectRef, description: String) -> QueryOutcome {
    let mut record = StatusRecord::unknown(description);
    record.display_name = canonicalize(&key.key);
    QueryOutcome {
        key,
        status: ObjectStatus::Found(vec![record]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_status_picks_the_worst_member_state() {
        let mut counts = StateCounts::new();
        counts.add(State::Ok);
        counts.add(State::Ok);
        counts.add(State::Warning);
        match group_status("web servers", Some(&counts)) {
            ObjectStatus::Found(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].state, State::Warning);
                assert_eq!(records[0].display_name, "web servers");
            }
            ObjectStatus::NotFound => panic!("expected a summary record"),
        }
    }

    #[test]
    fn empty_group_counts_are_not_found() {
        assert_eq!(group_status("empty", None), ObjectStatus::NotFound);
        assert_eq!(
            group_status("empty", Some(&StateCounts::new())),
            ObjectStatus::NotFound
        );
    }
}
