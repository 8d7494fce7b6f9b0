//! statmap-core - Core traits and types for statmap monitoring backends
//!
//! This crate provides the fundamental abstractions that allow different
//! monitoring systems (Zabbix, Nagios-compatible cores, etc.) to feed one
//! canonical status model.

pub mod backend;
pub mod config;
pub mod error;
pub mod keys;
pub mod status;

pub use backend::{MonitoringBackend, ObjectListing, QueryOptions, StatusFilter};
pub use config::{BackendSettings, ConfigFormat, ConfigOption, ConfigSchema};
pub use error::{BackendError, BackendResult};
pub use keys::{canonicalize, ObjectKind, ObjectRef, ServiceKey};
pub use status::{State, StateCounts, StatusRecord};
