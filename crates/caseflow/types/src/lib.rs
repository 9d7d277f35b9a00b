//! Ticket Workflow Domain Types for Caseflow
//!
//! Tickets in Caseflow move through **configurable workflow graphs** —
//! directed graphs of states connected by event-named transitions, each
//! transition optionally carrying an SLA deadline and per-level
//! escalation timeouts.
//!
//! # Key Concepts
//!
//! - **Workflow**: A validated graph of states and transitions. Exactly
//!   one state is the initial state; `(source state, event)` routes
//!   deterministically to at most one target state.
//! - **Ticket**: A work item owned by a team, always sitting in exactly
//!   one state of its workflow. Mutated only through the transition
//!   executor, serialized per ticket via an optimistic version token.
//! - **TransitionRecord**: An append-only history row written for every
//!   applied transition, carrying the computed SLA due date. The history
//!   is both the audit trail and the source of truth for lateness.
//! - **EscalationLevel / EscalationEntry**: Successive severity tiers of
//!   SLA breach. The entry for a `(ticket, level)` pair exists at most
//!   once — its existence is the idempotency guard for escalation.
//! - **TicketEvent**: Domain events emitted for external consumption
//!   when a transition is applied or an SLA is violated.
//!
//! # Design Principles
//!
//! 1. Workflow configuration is immutable once validated. A malformed
//!    graph is rejected at registration time, never at request time.
//! 2. An undefined `(state, event)` pair is a normal outcome, not a
//!    system error.
//! 3. Escalation fires at most once per `(ticket, level)`; notification
//!    delivery and escalation bookkeeping are decoupled.

#![deny(unsafe_code)]

mod errors;
mod escalation;
mod events;
mod history;
mod ids;
mod ticket;
mod workflow;

pub use errors::*;
pub use escalation::*;
pub use events::*;
pub use history::*;
pub use ids::*;
pub use ticket::*;
pub use workflow::*;
