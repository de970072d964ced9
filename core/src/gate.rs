// Tool Gate
// Wraps tools so every invocation passes through human review first

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use tollgate_config::{DEFAULT_REVIEW_DESCRIPTION, ReviewConfig};
use tollgate_protocol::{
  ActionRequest, DecisionKind, ReviewDecision, ReviewPolicy, ReviewRequest, ToolArgs,
};

use crate::review::ReviewSession;
use crate::tools::{IntoTool, Tool, ToolContext, ToolError, ToolRegistry, ToolSpec};

/// Gate `tool` behind `session`. A `None` policy permits all four outcomes.
pub fn wrap(
  tool: impl IntoTool,
  session: Arc<dyn ReviewSession>,
  policy: Option<ReviewPolicy>,
) -> GatedTool {
  GatedTool {
    inner: tool.into_tool(),
    session,
    policy: policy.unwrap_or_default(),
    description: DEFAULT_REVIEW_DESCRIPTION.to_string(),
  }
}

/// A tool whose every invocation waits for a reviewer's decision.
///
/// It reports the wrapped tool's spec unchanged, so hosts and schema-driven UIs cannot tell
/// the two apart.
pub struct GatedTool {
  inner: Arc<dyn Tool>,
  session: Arc<dyn ReviewSession>,
  policy: ReviewPolicy,
  description: String,
}

impl GatedTool {
  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn policy(&self) -> &ReviewPolicy {
    &self.policy
  }

  pub fn inner(&self) -> &Arc<dyn Tool> {
    &self.inner
  }

  fn review_request(&self, args: ToolArgs) -> ReviewRequest {
    ReviewRequest::new(
      ActionRequest::new(self.inner.name(), args),
      self.policy,
      self.description.clone(),
    )
  }
}

#[async_trait]
impl Tool for GatedTool {
  fn spec(&self) -> &ToolSpec {
    self.inner.spec()
  }

  async fn invoke(&self, args: ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError> {
    let name = self.inner.name();
    let decision = self
      .session
      .request(self.review_request(args.clone()), ctx)
      .await?;

    if let Some(kind) = decision.kind()
      && !self.policy.permits(kind)
    {
      warn!(tool = name, decision = %kind, "reviewer chose a decision the policy forbids");
      return Err(ToolError::DecisionNotPermitted {
        kind: kind.to_string(),
      });
    }

    match decision {
      ReviewDecision::Accept => {
        debug!(tool = name, "review accepted; running tool");
        self.inner.invoke(args, ctx).await
      }
      ReviewDecision::Edit { action } => {
        debug!(tool = name, edited_action = %action.action, "review edited arguments; running tool");
        self.inner.invoke(action.args, ctx).await
      }
      ReviewDecision::Respond { feedback } => {
        debug!(tool = name, "review responded in place of the tool");
        Ok(feedback)
      }
      ReviewDecision::Ignore => Err(ToolError::UnsupportedDecision {
        kind: DecisionKind::Ignore.to_string(),
      }),
      ReviewDecision::Unsupported { kind } => Err(ToolError::UnsupportedDecision { kind }),
    }
  }
}

/// Applies one review session, policy and description to many tools.
#[derive(Clone)]
pub struct ToolGate {
  session: Arc<dyn ReviewSession>,
  policy: ReviewPolicy,
  description: String,
}

impl ToolGate {
  pub fn new(session: Arc<dyn ReviewSession>) -> Self {
    Self {
      session,
      policy: ReviewPolicy::default(),
      description: DEFAULT_REVIEW_DESCRIPTION.to_string(),
    }
  }

  pub fn from_config(session: Arc<dyn ReviewSession>, config: &ReviewConfig) -> Self {
    Self {
      session,
      policy: config.policy,
      description: config.description.clone(),
    }
  }

  pub fn with_policy(mut self, policy: ReviewPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn wrap(&self, tool: impl IntoTool) -> GatedTool {
    wrap(tool, self.session.clone(), Some(self.policy)).with_description(self.description.clone())
  }

  pub fn wrap_all<I, T>(&self, tools: I) -> Vec<GatedTool>
  where
    I: IntoIterator<Item = T>,
    T: IntoTool,
  {
    tools.into_iter().map(|tool| self.wrap(tool)).collect()
  }

  /// A registry holding the gated counterpart of every tool in `registry`.
  pub fn gate_registry(&self, registry: &ToolRegistry) -> Result<ToolRegistry, ToolError> {
    ToolRegistry::from_tools(registry.tools().cloned().map(|tool| self.wrap(tool)))
  }
}
