//! Domain events emitted by the engine and the SLA scanner
//!
//! Events are fire-and-forget: listeners (auditing, notification
//! fan-out) subscribe to the bus; the emitting side never waits on them.

use crate::{EscalationLevel, EventName, StateId, TicketId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A domain event concerning one ticket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    /// A transition was applied to a ticket
    TransitionApplied {
        ticket_id: TicketId,
        workflow_id: WorkflowId,
        event: EventName,
        from_state: StateId,
        to_state: StateId,
        occurred_at: DateTime<Utc>,
    },

    /// A ticket breached the SLA of a pending transition and was
    /// escalated at the given level
    SlaViolated {
        ticket_id: TicketId,
        workflow_id: WorkflowId,
        /// The event of the transition whose SLA was breached
        event: EventName,
        /// The state that transition would have moved the ticket to
        to_state: StateId,
        level: EscalationLevel,
        /// The deadline that was missed
        due_at: DateTime<Utc>,
    },
}

impl TicketEvent {
    /// The ticket this event concerns
    pub fn ticket_id(&self) -> &TicketId {
        match self {
            TicketEvent::TransitionApplied { ticket_id, .. } => ticket_id,
            TicketEvent::SlaViolated { ticket_id, .. } => ticket_id,
        }
    }

    /// Short kind tag, for logging and counters
    pub fn kind(&self) -> &'static str {
        match self {
            TicketEvent::TransitionApplied { .. } => "transition_applied",
            TicketEvent::SlaViolated { .. } => "sla_violated",
        }
    }
}
