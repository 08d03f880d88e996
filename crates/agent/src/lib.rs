//! The DataBot planner.
//!
//! One user turn runs as **Plan → Execute**:
//!
//! 1. **Retrieve** data dictionary records relevant to the question,
//!    packed to a token budget
//! 2. **Prompt** the model with the records spliced into the system prompt
//! 3. **Plan** a `SAY` command from the reply
//! 4. **Execute** the plan against the turn context

pub mod plan;
pub mod planner;

#[cfg(test)]
mod test_helpers;

pub use plan::{Plan, PlanCommand, format_say};
pub use planner::Planner;
