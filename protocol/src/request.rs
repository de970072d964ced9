use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decision::DecisionKind;

/// Tool arguments keyed by parameter name.
pub type ToolArgs = Map<String, Value>;

/// Correlation key linking a paused invocation to the decision that resumes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(String);

impl ReviewId {
  /// Fresh random id for invocations the host did not label.
  pub fn new() -> Self {
    Self(uuid::Uuid::new_v4().to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Default for ReviewId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for ReviewId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<String> for ReviewId {
  fn from(value: String) -> Self {
    Self(value)
  }
}

impl From<&str> for ReviewId {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

/// The tool call put in front of the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
  pub action: String,
  #[serde(default)]
  pub args: ToolArgs,
}

impl ActionRequest {
  pub fn new(action: impl Into<String>, args: ToolArgs) -> Self {
    Self {
      action: action.into(),
      args,
    }
  }
}

/// Which outcomes the reviewer may choose for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewPolicy {
  pub allow_accept: bool,
  pub allow_edit: bool,
  pub allow_respond: bool,
  pub allow_ignore: bool,
}

impl ReviewPolicy {
  /// Policy that permits only accepting or ignoring the call as proposed.
  pub fn accept_or_ignore() -> Self {
    Self {
      allow_accept: true,
      allow_edit: false,
      allow_respond: false,
      allow_ignore: true,
    }
  }

  pub fn permits(&self, kind: DecisionKind) -> bool {
    match kind {
      DecisionKind::Accept => self.allow_accept,
      DecisionKind::Edit => self.allow_edit,
      DecisionKind::Respond => self.allow_respond,
      DecisionKind::Ignore => self.allow_ignore,
    }
  }
}

impl Default for ReviewPolicy {
  fn default() -> Self {
    Self {
      allow_accept: true,
      allow_edit: true,
      allow_respond: true,
      allow_ignore: true,
    }
  }
}

/// One review round-trip, as handed to the review authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
  pub action_request: ActionRequest,
  pub config: ReviewPolicy,
  pub description: String,
}

impl ReviewRequest {
  pub fn new(
    action_request: ActionRequest,
    config: ReviewPolicy,
    description: impl Into<String>,
  ) -> Self {
    Self {
      action_request,
      config,
      description: description.into(),
    }
  }

  pub fn action(&self) -> &str {
    &self.action_request.action
  }

  pub fn args(&self) -> &ToolArgs {
    &self.action_request.args
  }
}
