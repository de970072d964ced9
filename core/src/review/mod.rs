// Review Session
// Suspend an invocation, hand its request to a reviewer, resume with the decision

mod broker;
mod error;

pub use broker::{ReviewBroker, cancel_review, record_decision};
pub use error::ReviewError;

use async_trait::async_trait;

use tollgate_protocol::{ReviewDecision, ReviewRequest};

use crate::tools::ToolContext;

/// Single-shot handoff to the review authority.
///
/// `request` returns exactly once per call: with the decision correlated to this request,
/// or with an error if the review is cancelled, expires or cannot be submitted.
#[async_trait]
pub trait ReviewSession: Send + Sync {
  async fn request(
    &self,
    request: ReviewRequest,
    ctx: &ToolContext,
  ) -> Result<ReviewDecision, ReviewError>;
}
