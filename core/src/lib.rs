// Tollgate Core Library

pub mod gate;
pub mod review;
pub mod tools;

pub use gate::{GatedTool, ToolGate, wrap};
pub use review::{ReviewBroker, ReviewError, ReviewSession};
pub use tools::{FunctionTool, IntoTool, Tool, ToolContext, ToolError, ToolRegistry, ToolSpec};
