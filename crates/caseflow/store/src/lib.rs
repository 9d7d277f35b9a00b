//! Storage layer for Caseflow
//!
//! Defines the narrow persistence seams the engine and the SLA scanner
//! depend on, plus in-memory implementations for development and
//! testing:
//!
//! - **TicketStore**: tickets and their transition history as one
//!   aggregate. `commit_transition` is the single atomic unit that
//!   appends a history record, moves the ticket, and bumps its version —
//!   partial application is impossible by construction.
//! - **EscalationLedger**: the idempotency ledger. `try_record` is an
//!   atomic insert-if-absent upsert, safe under concurrent scanners and
//!   retries.
//!
//! Production deployments put a database behind these traits; the
//! in-memory backends keep the same atomicity guarantees via `dashmap`
//! entry locking.

#![deny(unsafe_code)]

mod memory;
mod traits;

pub use memory::*;
pub use traits::*;
