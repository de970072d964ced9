use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::ReviewDecision;
use crate::request::{ReviewId, ReviewRequest};

/// Lifecycle of a correlation record.
///
/// `Pending -> Resolved -> Consumed` is the normal path; `Pending` may instead end in
/// `Cancelled` or `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
  Pending,
  Resolved,
  Consumed,
  Cancelled,
  Expired,
}

impl ReviewStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ReviewStatus::Pending => "pending",
      ReviewStatus::Resolved => "resolved",
      ReviewStatus::Consumed => "consumed",
      ReviewStatus::Cancelled => "cancelled",
      ReviewStatus::Expired => "expired",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      ReviewStatus::Consumed | ReviewStatus::Cancelled | ReviewStatus::Expired
    )
  }
}

impl fmt::Display for ReviewStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ReviewStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(ReviewStatus::Pending),
      "resolved" => Ok(ReviewStatus::Resolved),
      "consumed" => Ok(ReviewStatus::Consumed),
      "cancelled" => Ok(ReviewStatus::Cancelled),
      "expired" => Ok(ReviewStatus::Expired),
      other => Err(format!("unknown review status: {other}")),
    }
  }
}

/// Persisted link between a paused invocation and its eventual decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
  pub id: ReviewId,
  pub request: ReviewRequest,
  pub status: ReviewStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub decision: Option<ReviewDecision>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl ReviewRecord {
  /// Fresh `Pending` record, written once at submission.
  pub fn pending(id: ReviewId, request: ReviewRequest) -> Self {
    let now = Utc::now();
    Self {
      id,
      request,
      status: ReviewStatus::Pending,
      decision: None,
      created_at: now,
      updated_at: now,
    }
  }
}

/// Notifications for review surfaces watching the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReviewEvent {
  Requested { id: ReviewId, request: ReviewRequest },
  Resolved { id: ReviewId, kind: String },
  Cancelled { id: ReviewId },
  Expired { id: ReviewId },
}

impl ReviewEvent {
  pub fn id(&self) -> &ReviewId {
    match self {
      ReviewEvent::Requested { id, .. }
      | ReviewEvent::Resolved { id, .. }
      | ReviewEvent::Cancelled { id }
      | ReviewEvent::Expired { id } => id,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_round_trips_through_its_column_text() {
    for status in [
      ReviewStatus::Pending,
      ReviewStatus::Resolved,
      ReviewStatus::Consumed,
      ReviewStatus::Cancelled,
      ReviewStatus::Expired,
    ] {
      assert_eq!(status.as_str().parse::<ReviewStatus>(), Ok(status));
    }
    assert!("paused".parse::<ReviewStatus>().is_err());
  }

  #[test]
  fn only_retired_statuses_are_terminal() {
    assert!(!ReviewStatus::Pending.is_terminal());
    assert!(!ReviewStatus::Resolved.is_terminal());
    assert!(ReviewStatus::Consumed.is_terminal());
    assert!(ReviewStatus::Expired.is_terminal());
  }
}
