//! Storage trait definitions

use async_trait::async_trait;
use caseflow_types::{
    CaseflowResult, EscalationEntry, EscalationLevel, StateId, Ticket, TicketId,
    TransitionRecord, WorkflowId,
};
use chrono::{DateTime, Duration, Utc};

/// Persistence seam for tickets and their transition history.
///
/// Tickets and history form one aggregate: a transition must land in
/// both or in neither, which is why the commit lives here rather than
/// as two separate writes in the executor.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Insert a newly opened ticket. Fails with `TicketExists` if the id
    /// is already taken.
    async fn create(&self, ticket: Ticket) -> CaseflowResult<()>;

    /// Load a ticket by id
    async fn get(&self, id: &TicketId) -> CaseflowResult<Option<Ticket>>;

    /// All tickets of a workflow currently sitting in the given state
    async fn tickets_in_state(
        &self,
        workflow_id: &WorkflowId,
        state: &StateId,
    ) -> CaseflowResult<Vec<Ticket>>;

    /// Distinct workflow ids that have at least one ticket
    async fn workflow_ids(&self) -> CaseflowResult<Vec<WorkflowId>>;

    /// Atomically append `record` to the ticket's history, move the
    /// ticket to `record.to_state`, and bump its version — all or
    /// nothing.
    ///
    /// Fails with `StaleTicket` when `expected_version` no longer
    /// matches, which is how concurrent writers on the same ticket are
    /// serialized: the loser re-reads and retries against fresh state.
    async fn commit_transition(
        &self,
        ticket_id: &TicketId,
        expected_version: u64,
        record: TransitionRecord,
    ) -> CaseflowResult<Ticket>;

    /// Full history for a ticket, oldest first
    async fn history(&self, ticket_id: &TicketId) -> CaseflowResult<Vec<TransitionRecord>>;

    /// The most recent history record that entered the given state, if
    /// any. Tickets opened directly into the initial state have none.
    async fn latest_entry_into(
        &self,
        ticket_id: &TicketId,
        state: &StateId,
    ) -> CaseflowResult<Option<TransitionRecord>>;
}

/// The escalation idempotency ledger.
///
/// A `(ticket, level)` row exists at most once; its existence is what
/// prevents the scanner from escalating the same breach twice.
#[async_trait]
pub trait EscalationLedger: Send + Sync {
    /// Atomic insert-if-absent upsert. Returns `true` when the caller
    /// now owns the escalation: the row was inserted, or it existed but
    /// was older than `renotify_after` and has been refreshed. Returns
    /// `false` when the pair was already escalated within the window.
    ///
    /// Never fails on a write race — concurrent callers resolve through
    /// the upsert, with exactly one of them seeing `true`.
    async fn try_record(
        &self,
        ticket_id: &TicketId,
        level: EscalationLevel,
        now: DateTime<Utc>,
        renotify_after: Option<Duration>,
    ) -> CaseflowResult<bool>;

    /// Look up the ledger row for a `(ticket, level)` pair
    async fn get(
        &self,
        ticket_id: &TicketId,
        level: EscalationLevel,
    ) -> CaseflowResult<Option<EscalationEntry>>;

    /// Drop all rows for a ticket (cleanup after closure). Returns the
    /// number of rows removed.
    async fn prune_ticket(&self, ticket_id: &TicketId) -> CaseflowResult<usize>;
}
