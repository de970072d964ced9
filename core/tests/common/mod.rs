#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;

use tollgate_core::{FunctionTool, ToolContext, ToolError};
use tollgate_protocol::{ReviewEvent, ReviewId, ReviewRequest, ToolArgs};

/// Add two integers.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddArgs {
  pub a: i64,
  pub b: i64,
}

/// `add(a, b)` that counts how often it actually runs.
pub fn counting_add(calls: Arc<AtomicUsize>) -> FunctionTool {
  FunctionTool::infer("add", move |args: AddArgs, _ctx: ToolContext| {
    let calls = calls.clone();
    async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<_, ToolError>(args.a + args.b)
    }
  })
}

pub fn args(value: Value) -> ToolArgs {
  match value {
    Value::Object(map) => map,
    other => panic!("not an object: {other}"),
  }
}

/// Wait for the next review request the broker announces.
pub async fn next_request(
  events: &mut broadcast::Receiver<ReviewEvent>,
) -> (ReviewId, ReviewRequest) {
  tokio::time::timeout(Duration::from_secs(5), async {
    loop {
      match events.recv().await {
        Ok(ReviewEvent::Requested { id, request }) => return (id, request),
        Ok(_) => continue,
        Err(e) => panic!("event stream closed: {e}"),
      }
    }
  })
  .await
  .expect("no review request within 5s")
}
