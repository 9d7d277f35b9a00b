//! Transition history: the append-only audit log
//!
//! One record is written per applied transition, as part of the same
//! atomic unit that moves the ticket. Records are immutable and never
//! deleted; the latest record entering a ticket's current state is the
//! source of truth for "is this ticket currently late".

use crate::{EventName, StateId, TicketId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An applied transition, with its computed SLA due date
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Unique record identifier
    pub id: String,
    /// The ticket this record belongs to
    pub ticket_id: TicketId,
    /// The event that fired
    pub event: EventName,
    /// The state the ticket left
    pub from_state: StateId,
    /// The state the ticket entered
    pub to_state: StateId,
    /// When the transition was applied
    pub transitioned_at: DateTime<Utc>,
    /// `transitioned_at + sla_duration`, absent when the transition
    /// carries no SLA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_due_at: Option<DateTime<Utc>>,
}

impl TransitionRecord {
    /// Build a record, computing the due date from the SLA duration
    pub fn new(
        ticket_id: TicketId,
        event: EventName,
        from_state: StateId,
        to_state: StateId,
        transitioned_at: DateTime<Utc>,
        sla_duration_secs: Option<u64>,
    ) -> Self {
        let sla_due_at =
            sla_duration_secs.map(|secs| transitioned_at + Duration::seconds(secs as i64));
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id,
            event,
            from_state,
            to_state,
            transitioned_at,
            sla_due_at,
        }
    }

    /// Whether this record entered the given state
    pub fn enters(&self, state: &StateId) -> bool {
        &self.to_state == state
    }

    /// Whether the record's SLA has elapsed at `now`
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.sla_due_at, Some(due) if now > due)
    }
}
