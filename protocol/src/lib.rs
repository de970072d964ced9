// Tollgate Protocol
// Review request/decision types shared by the gate, the store and review surfaces

mod decision;
mod record;
mod request;

pub use decision::{DecisionKind, DecisionParseError, ReviewDecision, WireDecision};
pub use record::{ReviewEvent, ReviewRecord, ReviewStatus};
pub use request::{ActionRequest, ReviewId, ReviewPolicy, ReviewRequest, ToolArgs};
