//! In-memory storage backends for development and testing.
//!
//! Not suitable for production use. The atomicity contracts are kept:
//! `commit_transition` runs under the ticket's dashmap entry guard, so
//! concurrent commits on one ticket serialize; `try_record` is a single
//! entry-API check-and-set.

use crate::{EscalationLedger, TicketStore};
use async_trait::async_trait;
use caseflow_types::{
    CaseflowError, CaseflowResult, EscalationEntry, EscalationLevel, StateId, Ticket, TicketId,
    TransitionRecord, WorkflowId,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;

// ── Ticket Store ─────────────────────────────────────────────────────

/// One ticket and its append-only history, stored together so a
/// transition commit touches exactly one map entry
#[derive(Clone, Debug)]
struct TicketSlot {
    ticket: Ticket,
    history: Vec<TransitionRecord>,
}

/// In-memory ticket store
pub struct InMemoryTicketStore {
    slots: DashMap<TicketId, TicketSlot>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Total number of tickets stored
    pub fn ticket_count(&self) -> usize {
        self.slots.len()
    }

    /// Clear all tickets and history
    pub fn clear(&self) {
        self.slots.clear();
    }
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn create(&self, ticket: Ticket) -> CaseflowResult<()> {
        match self.slots.entry(ticket.id.clone()) {
            Entry::Occupied(_) => Err(CaseflowError::TicketExists(ticket.id)),
            Entry::Vacant(slot) => {
                slot.insert(TicketSlot {
                    ticket,
                    history: Vec::new(),
                });
                Ok(())
            }
        }
    }

    async fn get(&self, id: &TicketId) -> CaseflowResult<Option<Ticket>> {
        Ok(self.slots.get(id).map(|slot| slot.ticket.clone()))
    }

    async fn tickets_in_state(
        &self,
        workflow_id: &WorkflowId,
        state: &StateId,
    ) -> CaseflowResult<Vec<Ticket>> {
        Ok(self
            .slots
            .iter()
            .filter(|slot| {
                slot.ticket.workflow_id == *workflow_id && slot.ticket.current_state == *state
            })
            .map(|slot| slot.ticket.clone())
            .collect())
    }

    async fn workflow_ids(&self) -> CaseflowResult<Vec<WorkflowId>> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for slot in self.slots.iter() {
            if seen.insert(slot.ticket.workflow_id.clone()) {
                ids.push(slot.ticket.workflow_id.clone());
            }
        }
        Ok(ids)
    }

    async fn commit_transition(
        &self,
        ticket_id: &TicketId,
        expected_version: u64,
        record: TransitionRecord,
    ) -> CaseflowResult<Ticket> {
        // The entry guard holds the shard lock for the whole commit:
        // version check, state move, and history append are one unit.
        let mut slot = self
            .slots
            .get_mut(ticket_id)
            .ok_or_else(|| CaseflowError::TicketNotFound(ticket_id.clone()))?;

        if slot.ticket.version != expected_version {
            return Err(CaseflowError::StaleTicket {
                ticket: ticket_id.clone(),
                expected: expected_version,
                actual: slot.ticket.version,
            });
        }

        slot.ticket
            .advance(record.to_state.clone(), record.transitioned_at);
        slot.history.push(record);

        Ok(slot.ticket.clone())
    }

    async fn history(&self, ticket_id: &TicketId) -> CaseflowResult<Vec<TransitionRecord>> {
        let slot = self
            .slots
            .get(ticket_id)
            .ok_or_else(|| CaseflowError::TicketNotFound(ticket_id.clone()))?;
        Ok(slot.history.clone())
    }

    async fn latest_entry_into(
        &self,
        ticket_id: &TicketId,
        state: &StateId,
    ) -> CaseflowResult<Option<TransitionRecord>> {
        let slot = self
            .slots
            .get(ticket_id)
            .ok_or_else(|| CaseflowError::TicketNotFound(ticket_id.clone()))?;
        Ok(slot
            .history
            .iter()
            .rev()
            .find(|record| record.enters(state))
            .cloned())
    }
}

// ── Escalation Ledger ────────────────────────────────────────────────

/// In-memory escalation ledger
pub struct InMemoryEscalationLedger {
    entries: DashMap<(TicketId, EscalationLevel), DateTime<Utc>>,
}

impl InMemoryEscalationLedger {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Total number of ledger rows
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryEscalationLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EscalationLedger for InMemoryEscalationLedger {
    async fn try_record(
        &self,
        ticket_id: &TicketId,
        level: EscalationLevel,
        now: DateTime<Utc>,
        renotify_after: Option<Duration>,
    ) -> CaseflowResult<bool> {
        // Check and insert/refresh happen under the shard lock, as
        // one entry-API operation.
        match self.entries.entry((ticket_id.clone(), level)) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                tracing::debug!(ticket_id = %ticket_id, %level, "Escalation recorded");
                Ok(true)
            }
            Entry::Occupied(mut slot) => match renotify_after {
                Some(window) if *slot.get() < now - window => {
                    slot.insert(now);
                    tracing::debug!(ticket_id = %ticket_id, %level, "Escalation refreshed");
                    Ok(true)
                }
                _ => Ok(false),
            },
        }
    }

    async fn get(
        &self,
        ticket_id: &TicketId,
        level: EscalationLevel,
    ) -> CaseflowResult<Option<EscalationEntry>> {
        Ok(self
            .entries
            .get(&(ticket_id.clone(), level))
            .map(|at| EscalationEntry::new(ticket_id.clone(), level, *at)))
    }

    async fn prune_ticket(&self, ticket_id: &TicketId) -> CaseflowResult<usize> {
        let before = self.entries.len();
        self.entries.retain(|(id, _), _| id != ticket_id);
        Ok(before - self.entries.len())
    }
}
