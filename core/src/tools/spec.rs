use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name, description and input schema: everything a host or a schema-driven UI can see
/// of a tool without calling it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
  pub name: String,
  pub description: String,
  pub input_schema: Value,
}

impl ToolSpec {
  pub fn new(
    name: impl Into<String>,
    description: impl Into<String>,
    input_schema: impl Into<Value>,
  ) -> Self {
    Self {
      name: name.into(),
      description: description.into(),
      input_schema: input_schema.into(),
    }
  }
}
