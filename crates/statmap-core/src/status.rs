//! Canonical status model every driver normalizes into

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Canonical object state.
///
/// Closed enumeration shared by host and service records. No total order is
/// implied by the variant order; severity ranking is a separate policy table
/// (`severity_rank`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Host is reachable
    Up,
    /// Service check passed
    Ok,
    /// Service check reported a warning
    Warning,
    /// Service check failed
    Critical,
    /// Host is unreachable
    Down,
    /// State could not be determined
    Unknown,
    /// No check result yet
    Pending,
}

impl State {
    /// Severity policy table used by filters and summary displays.
    ///
    /// Ranks operational badness, not protocol order: an unknown object is
    /// worse than a pending one but better than a confirmed problem.
    pub fn severity_rank(self) -> u8 {
        match self {
            State::Up | State::Ok => 0,
            State::Pending => 1,
            State::Unknown => 2,
            State::Warning => 3,
            State::Down => 4,
            State::Critical => 5,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Up => "up",
            State::Ok => "ok",
            State::Warning => "warning",
            State::Critical => "critical",
            State::Down => "down",
            State::Unknown => "unknown",
            State::Pending => "pending",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(State::Up),
            "ok" => Ok(State::Ok),
            "warning" => Ok(State::Warning),
            "critical" => Ok(State::Critical),
            "down" => Ok(State::Down),
            "unknown" => Ok(State::Unknown),
            "pending" => Ok(State::Pending),
            _ => Err(format!("Unknown state: '{}'", s)),
        }
    }
}

/// Canonical status record for one monitored object (host or service).
///
/// Every field a backend cannot fill stays `None` and serializes as an
/// explicit `null` — consumers depend on keyed completeness, so absences
/// are never dropped from the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Canonical state, always populated (UNKNOWN when the backend reply
    /// is ambiguous or absent)
    pub state: State,
    /// Human-readable state description
    pub state_description: String,
    /// Whether the problem has been acknowledged
    pub acknowledged: Option<bool>,
    /// Whether the object is in a scheduled downtime
    pub in_downtime: Option<bool>,
    /// Whether the object is flapping; `None` when the backend has no
    /// flapping notion
    pub is_flapping: Option<bool>,
    /// Time of the last check, epoch seconds
    pub last_check: Option<i64>,
    /// Time of the last state change, epoch seconds
    pub last_state_change: Option<i64>,
    /// Check plugin output
    pub plugin_output: Option<String>,
    /// Extended plugin output
    pub long_plugin_output: Option<String>,
    /// Canonicalized identifier, safe as a lookup key
    pub display_name: String,
    /// Owning host, for service records
    pub host_name: Option<String>,
}

impl StatusRecord {
    /// Create a record with the given state and description; every other
    /// field starts as an explicit null/unset marker.
    pub fn new(state: State, state_description: impl Into<String>) -> Self {
        Self {
            state,
            state_description: state_description.into(),
            acknowledged: None,
            in_downtime: None,
            is_flapping: None,
            last_check: None,
            last_state_change: None,
            plugin_output: None,
            long_plugin_output: None,
            display_name: String::new(),
            host_name: None,
        }
    }

    /// Degraded record for an object whose backend query failed
    pub fn unknown(description: impl Into<String>) -> Self {
        Self::new(State::Unknown, description)
    }
}

/// Per-state aggregate counters for summary displays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateCounts {
    counts: HashMap<State, u32>,
}

impl StateCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one object in the given state
    pub fn add(&mut self, state: State) {
        *self.counts.entry(state).or_insert(0) += 1;
    }

    /// Number of objects counted in the given state
    pub fn get(&self, state: State) -> u32 {
        self.counts.get(&state).copied().unwrap_or(0)
    }

    /// Total number of counted objects
    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn state_roundtrips_through_display() {
        for state in [
            State::Up,
            State::Ok,
            State::Warning,
            State::Critical,
            State::Down,
            State::Unknown,
            State::Pending,
        ] {
            assert_eq!(state.to_string().parse::<State>(), Ok(state));
        }
    }

    #[test]
    fn severity_ranks_problems_above_unknown() {
        assert!(State::Critical.severity_rank() > State::Warning.severity_rank());
        assert!(State::Down.severity_rank() > State::Unknown.severity_rank());
        assert!(State::Unknown.severity_rank() > State::Ok.severity_rank());
        assert_eq!(State::Up.severity_rank(), State::Ok.severity_rank());
    }

    #[test]
    fn new_record_leaves_unsupported_fields_null() {
        let record = StatusRecord::new(State::Ok, "Service is OK");
        assert_eq!(record.acknowledged, None);
        assert_eq!(record.last_check, None);
        assert_eq!(record.host_name, None);
    }

    #[test]
    fn unsupported_fields_serialize_as_explicit_null() {
        let record = StatusRecord::new(State::Ok, "Service is OK");
        let json = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();
        // Present with null, never omitted
        assert!(obj.contains_key("is_flapping"));
        assert!(obj["is_flapping"].is_null());
        assert!(obj.contains_key("last_state_change"));
        assert!(obj["last_state_change"].is_null());
    }

    #[test]
    fn state_counts_accumulate() {
        let mut counts = StateCounts::new();
        counts.add(State::Ok);
        counts.add(State::Ok);
        counts.add(State::Critical);
        assert_eq!(counts.get(State::Ok), 2);
        assert_eq!(counts.get(State::Critical), 1);
        assert_eq!(counts.get(State::Down), 0);
        assert_eq!(counts.total(), 3);
    }
}
