//! Error types for the Caseflow core

use crate::{EventName, StateId, TicketId, WorkflowId};

/// Errors that can occur in Caseflow operations
///
/// `NoSuchTransition` is an expected outcome (a UI asking "what is valid
/// from here" hits it constantly) and is deliberately distinct from the
/// configuration errors, which are fatal at workflow registration time.
#[derive(Debug, thiserror::Error)]
pub enum CaseflowError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    #[error("Ticket already exists: {0}")]
    TicketExists(TicketId),

    #[error("State '{state}' not found in workflow {workflow}")]
    StateNotFound {
        workflow: WorkflowId,
        state: StateId,
    },

    #[error("No transition from state '{state}' for event '{event}'")]
    NoSuchTransition { state: StateId, event: EventName },

    #[error("Invalid transition for ticket {ticket}: event '{event}' is not defined from state '{state}'")]
    InvalidTransition {
        ticket: TicketId,
        state: StateId,
        event: EventName,
    },

    #[error("Workflow has no initial state")]
    NoInitialState,

    #[error("Workflow has {0} initial states, expected exactly one")]
    MultipleInitialStates(usize),

    #[error("Duplicate state id: {0}")]
    DuplicateStateId(StateId),

    #[error("Duplicate transition from '{state}' on event '{event}'")]
    DuplicateTransition { state: StateId, event: EventName },

    #[error("Transition references unknown state: {0}")]
    UnknownStateRef(StateId),

    #[error("Stale ticket {ticket}: expected version {expected}, found {actual}")]
    StaleTicket {
        ticket: TicketId,
        expected: u64,
        actual: u64,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias for Caseflow operations
pub type CaseflowResult<T> = Result<T, CaseflowError>;
