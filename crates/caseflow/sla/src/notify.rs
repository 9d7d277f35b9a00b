//! Notification fan-out for SLA violations
//!
//! Listens on the event bus; for each `SlaViolated` event, computes the
//! recipient set (assignee plus team managers, de-duplicated by
//! identity), consults the deduplication cache per recipient, and only
//! then dispatches through the external transport collaborators.
//! Transport failures are logged and swallowed — the escalation ledger
//! is never rolled back because an email bounced.

use crate::{DedupKey, DeduplicationCache, SlaConfig};
use async_trait::async_trait;
use caseflow_store::TicketStore;
use caseflow_types::{TeamId, TicketEvent, UserId};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

// ── External Collaborators ───────────────────────────────────────────

/// Transport-layer failure. Logged by the listener, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Email dispatch failed: {0}")]
    Email(String),

    #[error("Slack dispatch failed: {0}")]
    Slack(String),

    #[error("Realtime push failed: {0}")]
    Realtime(String),
}

/// Outbound notification transports (mail, Slack, WebSocket push).
/// Implementations live outside this core; retry policy, if any, is
/// theirs.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_email(
        &self,
        recipient: &UserId,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError>;

    async fn send_slack(&self, message: &str, channel: &str) -> Result<(), NotificationError>;

    async fn push_realtime(
        &self,
        recipient: &UserId,
        payload: &TicketEvent,
    ) -> Result<(), NotificationError>;
}

/// Read-only directory of team membership
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// The managers of a team — always notified on a breach
    async fn managers_of(&self, team: &TeamId) -> Vec<UserId>;
}

// ── Listener ─────────────────────────────────────────────────────────

/// Fans `SlaViolated` events out to de-duplicated recipients
pub struct SlaViolationListener {
    store: Arc<dyn TicketStore>,
    directory: Arc<dyn TeamDirectory>,
    sender: Arc<dyn NotificationSender>,
    dedup: Arc<DeduplicationCache>,
    config: SlaConfig,
}

impl SlaViolationListener {
    pub fn new(
        store: Arc<dyn TicketStore>,
        directory: Arc<dyn TeamDirectory>,
        sender: Arc<dyn NotificationSender>,
        dedup: Arc<DeduplicationCache>,
        config: SlaConfig,
    ) -> Self {
        Self {
            store,
            directory,
            sender,
            dedup,
            config,
        }
    }

    /// Consume the event bus on a background task, so dispatch I/O
    /// never blocks the scanner or the executor
    pub fn spawn(self: Arc<Self>, mut rx: broadcast::Receiver<TicketEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.handle(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Notification listener lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Handle one event. Non-violation events are ignored.
    pub async fn handle(&self, event: &TicketEvent) {
        let TicketEvent::SlaViolated {
            ticket_id,
            workflow_id,
            event: breached_event,
            to_state,
            level,
            due_at,
        } = event
        else {
            return;
        };

        let ticket = match self.store.get(ticket_id).await {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                tracing::warn!(ticket_id = %ticket_id, "Violating ticket no longer exists");
                return;
            }
            Err(e) => {
                tracing::warn!(ticket_id = %ticket_id, error = %e, "Failed to load violating ticket");
                return;
            }
        };

        // Assignee first, then team managers, identity-deduplicated
        let mut recipients: Vec<UserId> = Vec::new();
        if let Some(assignee) = ticket.assignee.clone() {
            recipients.push(assignee);
        }
        for manager in self.directory.managers_of(&ticket.team_id).await {
            if !recipients.contains(&manager) {
                recipients.push(manager);
            }
        }
        if recipients.is_empty() {
            tracing::debug!(ticket_id = %ticket_id, "No recipients for SLA violation");
            return;
        }

        let due = due_at.format("%Y-%m-%d %H:%M UTC");
        let subject = format!("SLA violated: {}", ticket.title);
        let body = format!(
            "The ticket \"{}\" assigned to you or your team has violated its SLA ({}). \
             The SLA was due on {}. Please take necessary action immediately.",
            ticket.title, level, due
        );

        for recipient in recipients {
            let key = DedupKey {
                recipient: recipient.clone(),
                ticket_id: ticket_id.clone(),
                workflow_id: workflow_id.clone(),
                event: breached_event.clone(),
                to_state: to_state.clone(),
                source_job: self.config.job_name.clone(),
            };

            if !self.dedup.try_acquire(&key, self.config.dedup_ttl()) {
                tracing::debug!(
                    recipient = %recipient,
                    ticket_id = %ticket_id,
                    "Duplicate SLA notification suppressed"
                );
                continue;
            }

            if let Err(e) = self.sender.send_email(&recipient, &subject, &body).await {
                tracing::warn!(recipient = %recipient, error = %e, "Email dispatch failed");
            }
            if let Err(e) = self.sender.send_slack(&body, &ticket.team_id.0).await {
                tracing::warn!(recipient = %recipient, error = %e, "Slack dispatch failed");
            }
            if let Err(e) = self.sender.push_realtime(&recipient, event).await {
                tracing::warn!(recipient = %recipient, error = %e, "Realtime push failed");
            }
        }
    }
}
