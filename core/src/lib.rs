//! Native core of the HttpOverWifi plugin.
//!
//! # Overview
//! Performs one HTTP request pinned to the device's WiFi interface, even
//! when cellular is the OS default route, and reports the result in the
//! shape the plugin bridge expects.
//!
//! # Design
//! - `options` validates the bridge arguments before any network action.
//! - `network` enumerates interfaces and picks a `ConnectionStrategy`
//!   based on the platform's binding capability.
//! - `transport` defines the step-wise `Connection` and the guards that
//!   release every stream and the connection exactly once.
//! - `executor` runs the linear exchange and tags the payload `Success` or
//!   `Failure` by whether a transport fault occurred, never by HTTP status.
//! - `blocking` is the production transport on `reqwest::blocking`.
//! - `plugin` maps action names and results onto the bridge's callbacks.
//!
//! Nothing is shared between calls; each request enumerates interfaces and
//! opens its connection afresh.

pub mod blocking;
pub mod error;
pub mod executor;
pub mod http;
pub mod network;
pub mod options;
pub mod plugin;
pub mod transport;

pub use blocking::ReqwestTransport;
pub use error::{BridgeError, ErrorKind};
pub use executor::Executor;
pub use http::{HttpMethod, RequestDescriptor, RequestOutcome, ResponsePayload, DEFAULT_TIMEOUT_MS};
pub use network::{
    select_strategy, ConnectionStrategy, InterfaceKind, NetworkInterface, NetworkProvider,
    SysfsNetworkProvider,
};
pub use options::{parse_args, parse_args_json};
pub use plugin::{HttpOverWifiPlugin, PluginResult, REQUEST_ACTION};
