//! Plugin action dispatch.
//!
//! The host bridge calls `exec(action, args)` with the action name and the
//! JSON argument array. Only `request` is handled; any other action yields
//! `None` so the bridge can report it as unhandled.

use serde_json::Value;

use crate::blocking::ReqwestTransport;
use crate::error::BridgeError;
use crate::executor::Executor;
use crate::http::RequestOutcome;
use crate::network::{NetworkProvider, SysfsNetworkProvider};
use crate::transport::Transport;

/// The single action this plugin handles.
pub const REQUEST_ACTION: &str = "request";

/// What the bridge sends back: a value on the success or error callback.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginResult {
    Success(Value),
    Error(Value),
}

impl PluginResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PluginResult::Success(_))
    }

    pub fn value(&self) -> &Value {
        match self {
            PluginResult::Success(v) | PluginResult::Error(v) => v,
        }
    }
}

impl From<&Result<RequestOutcome, BridgeError>> for PluginResult {
    /// Outcomes keep their structured payload on either channel; terminal
    /// errors become a plain message on the error channel.
    fn from(result: &Result<RequestOutcome, BridgeError>) -> Self {
        match result {
            Ok(RequestOutcome::Success(payload)) => PluginResult::Success(payload.to_json()),
            Ok(RequestOutcome::Failure(payload)) => PluginResult::Error(payload.to_json()),
            Err(e) => PluginResult::Error(Value::String(e.to_string())),
        }
    }
}

pub struct HttpOverWifiPlugin<P = SysfsNetworkProvider, T = ReqwestTransport> {
    executor: Executor<P, T>,
}

impl HttpOverWifiPlugin {
    pub fn system() -> Self {
        Self::new(Executor::system())
    }
}

impl<P: NetworkProvider, T: Transport> HttpOverWifiPlugin<P, T> {
    pub fn new(executor: Executor<P, T>) -> Self {
        Self { executor }
    }

    /// Run `action`, keeping the typed result. `None` for unknown actions.
    pub fn dispatch(&self, action: &str, args: &Value) -> Option<Result<RequestOutcome, BridgeError>> {
        if action != REQUEST_ACTION {
            tracing::debug!(action, "unhandled action");
            return None;
        }
        Some(self.executor.request(args))
    }

    pub fn exec(&self, action: &str, args: &Value) -> Option<PluginResult> {
        self.dispatch(action, args).map(|result| PluginResult::from(&result))
    }
}
