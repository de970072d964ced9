// Function Tools
// Adapts bare async callables into structured tools

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use tollgate_protocol::ToolArgs;

use crate::tools::context::{ToolContext, ToolError, parse_arguments};
use crate::tools::registry::Tool;
use crate::tools::spec::ToolSpec;

type BoxedFn =
  Box<dyn Fn(ToolArgs, ToolContext) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// A tool backed by an async function over a typed argument struct.
///
/// The input schema is inferred from the argument type with `schemars`, so the struct's
/// field types and doc comments are what a schema-driven UI shows.
pub struct FunctionTool {
  spec: ToolSpec,
  func: BoxedFn,
}

impl FunctionTool {
  pub fn new<A, R, F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    func: F,
  ) -> Self
  where
    A: DeserializeOwned + JsonSchema + 'static,
    R: Serialize + 'static,
    F: Fn(A, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
  {
    let name = name.into();
    let spec = ToolSpec::new(name.clone(), description, input_schema_for::<A>());
    let func: BoxedFn = Box::new(move |args: ToolArgs, ctx: ToolContext| {
      let call = parse_arguments::<A>(&name, args).map(|args| func(args, ctx));
      async move {
        let output = call?.await?;
        serde_json::to_value(output)
          .map_err(|e| ToolError::execution(format!("failed to encode tool result: {e}")))
      }
      .boxed()
    });
    Self { spec, func }
  }

  /// Like [`FunctionTool::new`], taking the description from the argument type's doc
  /// comment.
  pub fn infer<A, R, F, Fut>(name: impl Into<String>, func: F) -> Self
  where
    A: DeserializeOwned + JsonSchema + 'static,
    R: Serialize + 'static,
    F: Fn(A, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
  {
    let schema = input_schema_for::<A>();
    let description = ["description", "title"]
      .iter()
      .find_map(|key| schema.get(*key).and_then(Value::as_str))
      .unwrap_or_default()
      .to_string();
    Self::new(name, description, func)
  }
}

impl fmt::Debug for FunctionTool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FunctionTool")
      .field("spec", &self.spec)
      .finish_non_exhaustive()
  }
}

#[async_trait]
impl Tool for FunctionTool {
  fn spec(&self) -> &ToolSpec {
    &self.spec
  }

  async fn invoke(&self, args: ToolArgs, ctx: &ToolContext) -> Result<Value, ToolError> {
    (self.func)(args, ctx.clone()).await
  }
}

fn input_schema_for<A: JsonSchema>() -> Value {
  let mut schema = schemars::schema_for!(A).to_value();
  if let Value::Object(map) = &mut schema {
    map.remove("$schema");
  }
  schema
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use serde::Deserialize;
  use serde_json::json;

  /// Add two integers.
  #[derive(Debug, Deserialize, JsonSchema)]
  struct AddArgs {
    a: i64,
    b: i64,
  }

  fn add_tool() -> FunctionTool {
    FunctionTool::infer("add", |args: AddArgs, _ctx| async move {
      Ok::<_, ToolError>(args.a + args.b)
    })
  }

  fn args(value: Value) -> ToolArgs {
    match value {
      Value::Object(map) => map,
      other => panic!("not an object: {other}"),
    }
  }

  #[test]
  fn schema_and_description_come_from_the_argument_type() {
    let tool = add_tool();
    let spec = tool.spec();

    assert_eq!(spec.name, "add");
    assert_eq!(spec.description, "Add two integers.");
    assert_eq!(spec.input_schema["type"], "object");
    assert_eq!(spec.input_schema["properties"]["a"]["type"], "integer");
    assert_eq!(spec.input_schema["required"], json!(["a", "b"]));
    assert!(spec.input_schema.get("$schema").is_none());
  }

  #[tokio::test]
  async fn invokes_with_decoded_arguments() {
    let result = add_tool()
      .invoke(args(json!({ "a": 2, "b": 3 })), &ToolContext::new())
      .await
      .unwrap();
    assert_eq!(result, json!(5));
  }

  #[tokio::test]
  async fn bad_arguments_fail_before_the_function_runs() {
    let err = add_tool()
      .invoke(args(json!({ "a": "two" })), &ToolContext::new())
      .await
      .unwrap_err();
    assert!(matches!(err, ToolError::InvalidArguments(msg) if msg.contains("add")));
  }

  #[tokio::test]
  async fn context_reaches_the_function() {
    #[derive(Deserialize, JsonSchema)]
    struct Empty {}

    let tool = FunctionTool::new(
      "whoami",
      "Report the caller",
      |_: Empty, ctx: ToolContext| async move {
        Ok::<_, ToolError>(ctx.configurable.get("user").cloned().unwrap_or(Value::Null))
      },
    );
    let ctx = ToolContext::new().with_config("user", "ada");
    assert_eq!(tool.invoke(ToolArgs::new(), &ctx).await.unwrap(), json!("ada"));
  }
}
