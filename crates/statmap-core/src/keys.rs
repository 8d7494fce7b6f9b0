//! Object addressing and identifier canonicalization.
//!
//! Map objects are addressed by `(backend id, kind, key)`. Service keys use
//! the `~~` delimiter convention to distinguish "one specific service of a
//! host" from "all services of a host". These helpers centralise the parsing
//! and name canonicalization so every call site behaves identically.

use serde::{Deserialize, Serialize};

/// Kind of monitored object a key addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Host,
    Hostgroup,
    Servicegroup,
    Service,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ObjectKind::Host => "host",
            ObjectKind::Hostgroup => "hostgroup",
            ObjectKind::Servicegroup => "servicegroup",
            ObjectKind::Service => "service",
        };
        f.write_str(s)
    }
}

/// Fully-qualified reference to one monitored object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Configured backend that owns the object
    pub backend_id: String,
    /// Kind of object the key addresses
    pub kind: ObjectKind,
    /// Backend-local object key
    pub key: String,
}

impl ObjectRef {
    pub fn new(backend_id: impl Into<String>, kind: ObjectKind, key: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            kind,
            key: key.into(),
        }
    }
}

/// Canonicalize a backend-specific identifier into the restricted character
/// set `[0-9a-z\-: /_#.]` (case-insensitive). `%` is transliterated to
/// `prc` before stripping. Idempotent.
///
/// ```
/// # use statmap_core::keys::canonicalize;
/// assert_eq!(canonicalize("17126: CPU load > 90%"), "17126: CPU load  90prc");
/// let once = canonicalize("db01 (primary) über 5%");
/// assert_eq!(canonicalize(&once), once);
/// ```
pub fn canonicalize(name: &str) -> String {
    name.replace('%', "prc")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | ' ' | '/' | '_' | '#' | '.'))
        .collect()
}

/// Parsed form of a service key.
///
/// `host ~~ trigger-id: description` addresses one specific service; only
/// the first two delimiter-bounded fields are interpreted, the description
/// remainder is opaque and may contain arbitrary characters. A key without
/// the delimiter addresses every service of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceKey {
    /// All services of one host
    AllOfHost {
        /// Host name as the backend knows it
        host: String,
    },
    /// One specific service of one host
    Single {
        /// Host name as the backend knows it
        host: String,
        /// Backend-side service identifier (numeric)
        service_id: String,
        /// Opaque descriptive remainder
        description: String,
    },
}

impl ServiceKey {
    /// Parse a service key.
    ///
    /// ```
    /// # use statmap_core::keys::ServiceKey;
    /// assert_eq!(
    ///     ServiceKey::parse("web01~~4711: Free disk space on /"),
    ///     ServiceKey::Single {
    ///         host: "web01".to_string(),
    ///         service_id: "4711".to_string(),
    ///         description: "Free disk space on /".to_string(),
    ///     }
    /// );
    /// assert_eq!(
    ///     ServiceKey::parse("web01"),
    ///     ServiceKey::AllOfHost { host: "web01".to_string() }
    /// );
    /// ```
    pub fn parse(key: &str) -> ServiceKey {
        if let Some((host, rest)) = key.split_once("~~") {
            if let Some((id, description)) = rest.split_once(": ") {
                if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
                    return ServiceKey::Single {
                        host: host.to_string(),
                        service_id: id.to_string(),
                        description: description.to_string(),
                    };
                }
            }
        }
        // Anything that does not match the single-service convention is
        // treated as a whole-host query, delimiter junk included.
        ServiceKey::AllOfHost {
            host: key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_wire_unsafe_characters() {
        assert_eq!(canonicalize("db01 (primary)"), "db01 primary");
        assert_eq!(canonicalize("über-host"), "ber-host");
        assert_eq!(canonicalize("a_b#c.d/e:f"), "a_b#c.d/e:f");
    }

    #[test]
    fn canonicalize_transliterates_percent() {
        assert_eq!(canonicalize("load > 90%"), "load  90prc");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        for name in ["db01 (primary)", "load > 90%", "plain", "4711: Free disk space on /"] {
            let once = canonicalize(name);
            assert_eq!(canonicalize(&once), once);
        }
    }

    #[test]
    fn parse_single_service_key() {
        assert_eq!(
            ServiceKey::parse("web01~~17126: CPU load"),
            ServiceKey::Single {
                host: "web01".to_string(),
                service_id: "17126".to_string(),
                description: "CPU load".to_string(),
            }
        );
    }

    #[test]
    fn parse_description_with_delimiters_stays_opaque() {
        // Only the first two fields are interpreted
        assert_eq!(
            ServiceKey::parse("web01~~42: weird ~~ desc: with junk"),
            ServiceKey::Single {
                host: "web01".to_string(),
                service_id: "42".to_string(),
                description: "weird ~~ desc: with junk".to_string(),
            }
        );
    }

    #[test]
    fn parse_whole_host_key() {
        assert_eq!(
            ServiceKey::parse("web01"),
            ServiceKey::AllOfHost {
                host: "web01".to_string()
            }
        );
    }

    #[test]
    fn parse_non_numeric_id_falls_back_to_whole_host() {
        assert_eq!(
            ServiceKey::parse("web01~~abc: desc"),
            ServiceKey::AllOfHost {
                host: "web01~~abc: desc".to_string()
            }
        );
    }
}
