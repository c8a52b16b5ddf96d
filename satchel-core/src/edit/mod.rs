//! Batched entry edits.
//!
//! Instructions arrive either built in code ([`MutationInstruction`]) or as
//! the JSON wire form (`{"file", "action", "content"}`), are validated into a
//! [`MutationBatch`], and are turned into the next archive state by
//! [`plan`], which performs no I/O.

mod operation;
mod planner;

pub use operation::{Action, MutationBatch, MutationInstruction, WireInstruction};
pub use planner::{PlanSummary, plan};
