//! statmap-aggregate - Backend registry and status aggregation facade
//!
//! The single entry point for everything that consumes canonical status:
//! the facade fans a logical query out to the owning backend drivers,
//! merges their results in the caller's key order, and degrades objects of
//! failed backends instead of blanking the whole view.

mod facade;
mod registry;

pub use facade::{ObjectStatus, QueryOutcome, StatusAggregator};
pub use registry::BackendRegistry;
