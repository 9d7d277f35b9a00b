//! Tickets: the work items moving through workflow graphs
//!
//! A ticket always sits in exactly one state of its workflow. Its
//! current state is mutated only through the transition executor, which
//! serializes writers per ticket via the optimistic `version` token.

use crate::{StateId, TeamId, TicketId, UserId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ticket owned by a team, tracked through a workflow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique identifier
    pub id: TicketId,
    /// The workflow governing this ticket
    pub workflow_id: WorkflowId,
    /// The team that owns this ticket
    pub team_id: TeamId,
    /// Short summary of the request
    pub title: String,
    /// Who opened the ticket
    pub requester: UserId,
    /// Who is currently assigned, if anyone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<UserId>,
    /// The state the ticket currently sits in — always a state of its workflow
    pub current_state: StateId,
    /// Optimistic concurrency token, bumped on every committed transition
    pub version: u64,
    /// When the ticket was opened
    pub created_at: DateTime<Utc>,
    /// When the ticket last changed
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a new ticket in the given state (normally the workflow's
    /// initial state — the executor enforces that)
    pub fn new(
        workflow_id: WorkflowId,
        team_id: TeamId,
        requester: UserId,
        title: impl Into<String>,
        current_state: StateId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TicketId::generate(),
            workflow_id,
            team_id,
            title: title.into(),
            requester,
            assignee: None,
            current_state,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_assignee(mut self, user: UserId) -> Self {
        self.assignee = Some(user);
        self
    }

    /// Move the ticket to a new state, bumping the version token.
    ///
    /// Called by the store inside the atomic transition commit — not by
    /// application code directly.
    pub fn advance(&mut self, to_state: StateId, at: DateTime<Utc>) {
        self.current_state = to_state;
        self.version += 1;
        self.updated_at = at;
    }

    pub fn is_assigned(&self) -> bool {
        self.assignee.is_some()
    }
}
