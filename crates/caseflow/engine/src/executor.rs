//! Transition executor: the only writer of ticket state
//!
//! `apply_event` resolves the event against the ticket's current state,
//! writes the history record and the state move as one atomic commit,
//! and publishes `TransitionApplied`. Concurrent calls on the same
//! ticket serialize through the store's version check: the loser
//! re-reads fresh state and retries, so a transition is never silently
//! applied to a stale starting state.

use crate::{EventBus, WorkflowRegistry};
use caseflow_store::TicketStore;
use caseflow_types::{
    CaseflowError, CaseflowResult, EventName, State, TeamId, Ticket, TicketEvent, TicketId,
    TransitionRecord, UserId, WorkflowId,
};
use chrono::Utc;
use std::sync::Arc;

/// Commit attempts before a version conflict is surfaced to the caller
const MAX_COMMIT_RETRIES: u32 = 3;

/// Intake data for opening a ticket
#[derive(Clone, Debug)]
pub struct TicketIntake {
    pub workflow_id: WorkflowId,
    pub team_id: TeamId,
    pub requester: UserId,
    pub title: String,
    pub assignee: Option<UserId>,
}

impl TicketIntake {
    pub fn new(
        workflow_id: WorkflowId,
        team_id: TeamId,
        requester: UserId,
        title: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id,
            team_id,
            requester,
            title: title.into(),
            assignee: None,
        }
    }

    pub fn with_assignee(mut self, user: UserId) -> Self {
        self.assignee = Some(user);
        self
    }
}

/// Applies events to tickets against their workflow graphs
pub struct TransitionExecutor {
    registry: Arc<WorkflowRegistry>,
    store: Arc<dyn TicketStore>,
    events: Arc<EventBus>,
}

impl TransitionExecutor {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        store: Arc<dyn TicketStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            store,
            events,
        }
    }

    /// Open a ticket into its workflow's initial state
    pub async fn open_ticket(&self, intake: TicketIntake) -> CaseflowResult<Ticket> {
        let workflow = self.registry.get(&intake.workflow_id)?;
        let initial = workflow.initial_state()?;

        let mut ticket = Ticket::new(
            intake.workflow_id,
            intake.team_id,
            intake.requester,
            intake.title,
            initial.id.clone(),
        );
        if let Some(assignee) = intake.assignee {
            ticket = ticket.with_assignee(assignee);
        }

        self.store.create(ticket.clone()).await?;

        tracing::info!(
            ticket_id = %ticket.id,
            workflow_id = %ticket.workflow_id,
            state = %ticket.current_state,
            "Ticket opened"
        );
        Ok(ticket)
    }

    /// Apply an event to a ticket, returning the written history record.
    ///
    /// Fails with `InvalidTransition` (no mutation) when the event is
    /// not defined from the ticket's current state, and with
    /// `StaleTicket` when concurrent writers exhaust the retry budget.
    pub async fn apply_event(
        &self,
        ticket_id: &TicketId,
        event: &EventName,
    ) -> CaseflowResult<TransitionRecord> {
        let mut attempts = 0;

        loop {
            let ticket = self
                .store
                .get(ticket_id)
                .await?
                .ok_or_else(|| CaseflowError::TicketNotFound(ticket_id.clone()))?;
            let workflow = self.registry.get(&ticket.workflow_id)?;

            let transition = workflow
                .transition_from(&ticket.current_state, event)
                .ok_or_else(|| CaseflowError::InvalidTransition {
                    ticket: ticket_id.clone(),
                    state: ticket.current_state.clone(),
                    event: event.clone(),
                })?;

            let record = TransitionRecord::new(
                ticket_id.clone(),
                event.clone(),
                ticket.current_state.clone(),
                transition.target.clone(),
                Utc::now(),
                transition.sla_duration_secs,
            );

            match self
                .store
                .commit_transition(ticket_id, ticket.version, record.clone())
                .await
            {
                Ok(updated) => {
                    tracing::info!(
                        ticket_id = %ticket_id,
                        event = %event,
                        from = %record.from_state,
                        to = %record.to_state,
                        "Transition applied"
                    );
                    self.events.publish(TicketEvent::TransitionApplied {
                        ticket_id: ticket_id.clone(),
                        workflow_id: updated.workflow_id,
                        event: event.clone(),
                        from_state: record.from_state.clone(),
                        to_state: record.to_state.clone(),
                        occurred_at: record.transitioned_at,
                    });
                    return Ok(record);
                }
                Err(CaseflowError::StaleTicket { .. }) if attempts < MAX_COMMIT_RETRIES => {
                    // Another writer committed first; re-resolve against
                    // the state it wrote.
                    attempts += 1;
                    tracing::debug!(
                        ticket_id = %ticket_id,
                        event = %event,
                        attempts,
                        "Commit conflict, retrying against fresh state"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The events valid from a ticket's current state
    pub async fn valid_events(&self, ticket_id: &TicketId) -> CaseflowResult<Vec<EventName>> {
        let ticket = self
            .store
            .get(ticket_id)
            .await?
            .ok_or_else(|| CaseflowError::TicketNotFound(ticket_id.clone()))?;
        let workflow = self.registry.get(&ticket.workflow_id)?;
        Ok(workflow
            .transitions_from(&ticket.current_state)
            .into_iter()
            .map(|t| t.event.clone())
            .collect())
    }

    /// The states a ticket can move to from its current state
    pub async fn valid_target_states(&self, ticket_id: &TicketId) -> CaseflowResult<Vec<State>> {
        let ticket = self
            .store
            .get(ticket_id)
            .await?
            .ok_or_else(|| CaseflowError::TicketNotFound(ticket_id.clone()))?;
        self.registry
            .valid_target_states(&ticket.workflow_id, &ticket.current_state)
    }
}
