//! statmap-zabbix - Zabbix backend driver for statmap
//!
//! Speaks the Zabbix JSON-RPC API over HTTP(S) and normalizes its status
//! matrix (monitored/unmonitored x SNMP availability x agent availability
//! for hosts, state x value for triggers) into canonical status records.
//!
//! The wire protocol (method names, parameter shapes) is an external,
//! versioned contract owned by Zabbix; changes there require driver-side
//! adaptation only.

mod driver;
mod rpc;
mod session;

pub use driver::ZabbixBackend;
pub use rpc::{RpcClient, RpcError};
pub use session::SessionCache;
