use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use tollgate_protocol::ToolArgs;

use crate::review::ReviewError;

/// Per-invocation context handed in by the host.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
  /// Host-assigned call id. Also the review correlation key, so a host that replays a
  /// call after a restart gets the decision recorded for it.
  pub call_id: Option<String>,
  /// Per-invocation configuration passed through to the tool untouched.
  pub configurable: Map<String, Value>,
  /// Cancelling this aborts a parked review with [`ReviewError::Cancelled`].
  pub cancellation: CancellationToken,
}

impl ToolContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
    self.call_id = Some(call_id.into());
    self
  }

  pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.configurable.insert(key.into(), value.into());
    self
  }

  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.cancellation = token;
    self
  }
}

/// Decode tool arguments into a typed struct.
pub fn parse_arguments<T: DeserializeOwned>(name: &str, args: ToolArgs) -> Result<T, ToolError> {
  serde_json::from_value(Value::Object(args))
    .map_err(|e| ToolError::InvalidArguments(format!("invalid arguments for {name}: {e}")))
}

/// Tool invocation failures.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
  #[error("{0}")]
  InvalidArguments(String),
  #[error("tool not found: {0}")]
  NotFound(String),
  #[error("tool already registered: {0}")]
  DuplicateTool(String),
  #[error("{0}")]
  Execution(String),
  #[error("unsupported review decision: {kind}")]
  UnsupportedDecision { kind: String },
  #[error("review decision `{kind}` is not permitted for this tool")]
  DecisionNotPermitted { kind: String },
  #[error(transparent)]
  Review(#[from] ReviewError),
}

impl ToolError {
  pub fn execution(msg: impl Into<String>) -> Self {
    ToolError::Execution(msg.into())
  }
}
