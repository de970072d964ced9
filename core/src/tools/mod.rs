pub mod context;
pub mod function;
pub mod registry;
pub mod spec;

pub use context::{ToolContext, ToolError, parse_arguments};
pub use function::FunctionTool;
pub use registry::{IntoTool, Tool, ToolRegistry};
pub use spec::ToolSpec;
