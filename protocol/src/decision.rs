use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::{ActionRequest, ToolArgs};

/// The four outcomes a reviewer can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
  Accept,
  Edit,
  Respond,
  Ignore,
}

impl DecisionKind {
  /// Tag used on the wire.
  pub fn as_str(&self) -> &'static str {
    match self {
      DecisionKind::Accept => "accept",
      DecisionKind::Edit => "edit",
      DecisionKind::Respond => "response",
      DecisionKind::Ignore => "ignore",
    }
  }

  pub fn from_tag(tag: &str) -> Option<Self> {
    match tag {
      "accept" => Some(DecisionKind::Accept),
      "edit" => Some(DecisionKind::Edit),
      "response" | "respond" => Some(DecisionKind::Respond),
      "ignore" => Some(DecisionKind::Ignore),
      _ => None,
    }
  }
}

impl fmt::Display for DecisionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Reviewer's answer to a single [`crate::ReviewRequest`].
///
/// Unknown tags are kept as [`ReviewDecision::Unsupported`] rather than rejected at
/// decode time, so the paused invocation receives them and fails with a named error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireDecision", into = "WireDecision")]
pub enum ReviewDecision {
  /// Run the tool with the proposed arguments.
  Accept,
  /// Run the tool with the reviewer's replacement arguments.
  Edit { action: ActionRequest },
  /// Skip the tool and hand this payload back as its result.
  Respond { feedback: Value },
  /// Abandon the invocation.
  Ignore,
  /// A tag outside the known four.
  Unsupported { kind: String },
}

impl ReviewDecision {
  pub fn edit(action: impl Into<String>, args: ToolArgs) -> Self {
    ReviewDecision::Edit {
      action: ActionRequest::new(action, args),
    }
  }

  pub fn respond(feedback: impl Into<Value>) -> Self {
    ReviewDecision::Respond {
      feedback: feedback.into(),
    }
  }

  /// `None` for unsupported tags.
  pub fn kind(&self) -> Option<DecisionKind> {
    match self {
      ReviewDecision::Accept => Some(DecisionKind::Accept),
      ReviewDecision::Edit { .. } => Some(DecisionKind::Edit),
      ReviewDecision::Respond { .. } => Some(DecisionKind::Respond),
      ReviewDecision::Ignore => Some(DecisionKind::Ignore),
      ReviewDecision::Unsupported { .. } => None,
    }
  }

  /// The tag as it travels on the wire.
  pub fn tag(&self) -> &str {
    match self {
      ReviewDecision::Unsupported { kind } => kind,
      other => other.kind().map(|k| k.as_str()).unwrap_or_default(),
    }
  }
}

/// `{"type": <tag>, "args": <payload>}` as produced by review surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDecision {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub args: Option<Value>,
  /// Set when `kind` was not understood. Keeps a stored unsupported decision from being
  /// read back as a known one when its tag collides with one.
  #[serde(default, skip_serializing_if = "is_false")]
  pub unsupported: bool,
}

fn is_false(flag: &bool) -> bool {
  !*flag
}

#[derive(Debug, thiserror::Error)]
pub enum DecisionParseError {
  #[error("`{kind}` decision requires an args payload")]
  MissingPayload { kind: &'static str },
  #[error("invalid `{kind}` payload: {source}")]
  InvalidPayload {
    kind: &'static str,
    #[source]
    source: serde_json::Error,
  },
  #[error("malformed decision: {0}")]
  Malformed(#[from] serde_json::Error),
}

impl ReviewDecision {
  /// Decode a decision from arbitrary JSON submitted by a review surface.
  pub fn from_value(value: Value) -> Result<Self, DecisionParseError> {
    let wire: WireDecision = serde_json::from_value(value)?;
    Self::try_from(wire)
  }
}

impl TryFrom<WireDecision> for ReviewDecision {
  type Error = DecisionParseError;

  fn try_from(wire: WireDecision) -> Result<Self, Self::Error> {
    let known = DecisionKind::from_tag(&wire.kind).filter(|_| !wire.unsupported);
    let Some(kind) = known else {
      return Ok(ReviewDecision::Unsupported { kind: wire.kind });
    };

    match kind {
      DecisionKind::Accept => Ok(ReviewDecision::Accept),
      DecisionKind::Ignore => Ok(ReviewDecision::Ignore),
      DecisionKind::Edit => {
        let payload = wire
          .args
          .ok_or(DecisionParseError::MissingPayload { kind: "edit" })?;
        let action = serde_json::from_value(payload)
          .map_err(|source| DecisionParseError::InvalidPayload { kind: "edit", source })?;
        Ok(ReviewDecision::Edit { action })
      }
      DecisionKind::Respond => {
        let feedback = wire
          .args
          .ok_or(DecisionParseError::MissingPayload { kind: "response" })?;
        Ok(ReviewDecision::Respond { feedback })
      }
    }
  }
}

impl From<ReviewDecision> for WireDecision {
  fn from(decision: ReviewDecision) -> Self {
    match decision {
      ReviewDecision::Accept => WireDecision {
        kind: DecisionKind::Accept.as_str().to_string(),
        args: None,
        unsupported: false,
      },
      ReviewDecision::Ignore => WireDecision {
        kind: DecisionKind::Ignore.as_str().to_string(),
        args: None,
        unsupported: false,
      },
      ReviewDecision::Edit { action } => WireDecision {
        kind: DecisionKind::Edit.as_str().to_string(),
        args: serde_json::to_value(action).ok(),
        unsupported: false,
      },
      ReviewDecision::Respond { feedback } => WireDecision {
        kind: DecisionKind::Respond.as_str().to_string(),
        args: Some(feedback),
        unsupported: false,
      },
      ReviewDecision::Unsupported { kind } => WireDecision {
        kind,
        args: None,
        unsupported: true,
      },
    }
  }
}
