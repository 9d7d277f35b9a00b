//! Caseflow Workflow Engine
//!
//! The engine applies events to tickets. It:
//! 1. Registers workflow definitions (validated at registration — a
//!    malformed graph never activates)
//! 2. Opens tickets into their workflow's initial state
//! 3. Resolves `(current state, event)` and commits the transition as
//!    one atomic unit, serialized per ticket
//! 4. Publishes domain events for auditing and notification listeners
//!
//! The engine never sends notifications and never scans for SLA
//! breaches — those belong to `caseflow-sla`, which consumes the same
//! registry, store, and event bus.

#![deny(unsafe_code)]

mod bus;
mod executor;
mod registry;

pub use bus::*;
pub use executor::*;
pub use registry::*;
