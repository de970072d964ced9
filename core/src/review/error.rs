use std::time::Duration;

use tollgate_protocol::{DecisionParseError, ReviewId, ReviewStatus};
use tollgate_state::StateError;

/// Failures of the suspend/resume round-trip itself.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
  #[error("review {id} was cancelled")]
  Cancelled { id: ReviewId },
  #[error("review {id} expired after {timeout:?} without a decision")]
  Expired { id: ReviewId, timeout: Duration },
  #[error("review {0} is already awaiting a decision")]
  DuplicateRequest(ReviewId),
  #[error("review {id} is {status} and cannot be requested again")]
  Retired { id: ReviewId, status: ReviewStatus },
  #[error("unknown review {0}")]
  UnknownReview(ReviewId),
  #[error("review {id} is already {status}")]
  AlreadyResolved { id: ReviewId, status: ReviewStatus },
  #[error("review {0} was dropped before a decision arrived")]
  Abandoned(ReviewId),
  #[error("invalid decision: {0}")]
  Decision(#[from] DecisionParseError),
  #[error("review store error: {0}")]
  Store(#[from] StateError),
}
