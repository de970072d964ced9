use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use tollgate_protocol::ToolArgs;

use crate::tools::context::{ToolContext, ToolError};
use crate::tools::spec::ToolSpec;

/// A callable tool: identity plus an async execution function.
#[async_trait]
pub trait Tool: Send + Sync {
  fn spec(&self) -> &ToolSpec;

  async fn invoke(&self, args: ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError>;

  fn name(&self) -> &str {
    &self.spec().name
  }
}

/// Conversion into a shared structured tool.
///
/// This is the one place a value is checked for tool conformance; bare callables reach it
/// through [`crate::tools::FunctionTool`].
pub trait IntoTool {
  fn into_tool(self) -> Arc<dyn Tool>;
}

impl<T: Tool + 'static> IntoTool for T {
  fn into_tool(self) -> Arc<dyn Tool> {
    Arc::new(self)
  }
}

impl IntoTool for Arc<dyn Tool> {
  fn into_tool(self) -> Arc<dyn Tool> {
    self
  }
}

/// Tools by name; names are unique within a registry.
#[derive(Default)]
pub struct ToolRegistry {
  tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a registry, failing on the first repeated name.
  pub fn from_tools<I, T>(tools: I) -> Result<Self, ToolError>
  where
    I: IntoIterator<Item = T>,
    T: IntoTool,
  {
    let mut registry = Self::new();
    for tool in tools {
      registry.register(tool)?;
    }
    Ok(registry)
  }

  pub fn register(&mut self, tool: impl IntoTool) -> Result<(), ToolError> {
    let tool = tool.into_tool();
    let name = tool.name().to_string();
    if self.tools.contains_key(&name) {
      return Err(ToolError::DuplicateTool(name));
    }
    debug!(tool = %name, "registered tool");
    self.tools.insert(name, tool);
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
    self.tools.get(name)
  }

  pub fn len(&self) -> usize {
    self.tools.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tools.is_empty()
  }

  /// Specs sorted by name.
  pub fn specs(&self) -> Vec<ToolSpec> {
    let mut specs: Vec<ToolSpec> = self.tools.values().map(|tool| tool.spec().clone()).collect();
    specs.sort_by(|a, b| a.name.cmp(&b.name));
    specs
  }

  pub fn tools(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
    self.tools.values()
  }

  pub async fn dispatch(
    &self,
    name: &str,
    args: ToolArgs,
    ctx: &ToolContext,
  ) -> Result<Value, ToolError> {
    let tool = self
      .get(name)
      .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
    tool.invoke(args, ctx).await
  }
}
