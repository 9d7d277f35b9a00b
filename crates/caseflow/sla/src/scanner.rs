//! The SLA scanner: finds breached tickets and escalates them once
//!
//! The scanner is a pure function of `now` and the stores — no
//! in-process singleton state. Each run walks escalation levels in
//! ascending order; for every workflow transition that escalates at the
//! level, every ticket sitting in the transition's source state is
//! checked against `entry into current state + level timeout`. The
//! escalation ledger's atomic upsert makes re-runs and racing scanners
//! safe: a `(ticket, level)` breach is recorded and announced at most
//! once (per re-notify window).
//!
//! One ticket's failure never aborts the scan — it is logged, counted,
//! and the remaining tickets proceed.

use caseflow_engine::{EventBus, WorkflowRegistry};
use caseflow_store::{EscalationLedger, TicketStore};
use caseflow_types::{
    CaseflowResult, EscalationLevel, Ticket, TicketEvent, TicketId, Workflow, WorkflowId,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::SlaConfig;

// ── Scan Results ─────────────────────────────────────────────────────

/// One escalated SLA breach
#[derive(Clone, Debug)]
pub struct SlaBreach {
    pub ticket_id: TicketId,
    pub workflow_id: WorkflowId,
    pub level: EscalationLevel,
    /// The deadline that was missed
    pub due_at: DateTime<Utc>,
}

/// Outcome of one scan run
#[derive(Clone, Debug, Default)]
pub struct ScanReport {
    /// Ticket checks performed (a ticket is checked once per applicable
    /// level and transition)
    pub tickets_checked: usize,
    /// Breaches escalated this run
    pub breaches: Vec<SlaBreach>,
    /// Tickets skipped because their processing failed
    pub errors: usize,
}

// ── Scanner ──────────────────────────────────────────────────────────

/// Scans registered workflows for tickets in breach of their SLA
pub struct SlaScanner {
    registry: Arc<WorkflowRegistry>,
    store: Arc<dyn TicketStore>,
    ledger: Arc<dyn EscalationLedger>,
    events: Arc<EventBus>,
    renotify_after: Option<Duration>,
}

impl SlaScanner {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        store: Arc<dyn TicketStore>,
        ledger: Arc<dyn EscalationLedger>,
        events: Arc<EventBus>,
        config: &SlaConfig,
    ) -> Self {
        Self {
            registry,
            store,
            ledger,
            events,
            renotify_after: config.renotify_after(),
        }
    }

    /// Run one scan at the given instant.
    ///
    /// Entity-level errors never abort the run: they are isolated,
    /// logged, and counted in the report.
    pub async fn scan(&self, now: DateTime<Utc>) -> ScanReport {
        let mut report = ScanReport::default();

        for level in EscalationLevel::ALL {
            for workflow in self.registry.list() {
                self.scan_workflow(&workflow, level, now, &mut report).await;
            }
        }

        tracing::debug!(
            checked = report.tickets_checked,
            breaches = report.breaches.len(),
            errors = report.errors,
            "SLA scan finished"
        );
        report
    }

    async fn scan_workflow(
        &self,
        workflow: &Workflow,
        level: EscalationLevel,
        now: DateTime<Utc>,
        report: &mut ScanReport,
    ) {
        for transition in &workflow.transitions {
            let Some(timeout_secs) = transition.escalates_at(level) else {
                continue;
            };

            let tickets = match self
                .store
                .tickets_in_state(&workflow.id, &transition.source)
                .await
            {
                Ok(tickets) => tickets,
                Err(e) => {
                    tracing::warn!(
                        workflow_id = %workflow.id,
                        state = %transition.source,
                        error = %e,
                        "Failed to list tickets for state, skipping"
                    );
                    report.errors += 1;
                    continue;
                }
            };

            for ticket in tickets {
                report.tickets_checked += 1;
                match self.check_ticket(&ticket, level, timeout_secs, now).await {
                    Ok(Some(breach)) => {
                        tracing::info!(
                            ticket_id = %breach.ticket_id,
                            workflow_id = %breach.workflow_id,
                            level = %breach.level,
                            due_at = %breach.due_at,
                            "Ticket violates SLA, escalating"
                        );
                        self.events.publish(TicketEvent::SlaViolated {
                            ticket_id: breach.ticket_id.clone(),
                            workflow_id: breach.workflow_id.clone(),
                            event: transition.event.clone(),
                            to_state: transition.target.clone(),
                            level,
                            due_at: breach.due_at,
                        });
                        report.breaches.push(breach);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // Isolate this ticket's failure from its siblings
                        tracing::warn!(
                            ticket_id = %ticket.id,
                            level = %level,
                            error = %e,
                            "Skipping ticket after scan error"
                        );
                        report.errors += 1;
                    }
                }
            }
        }
    }

    /// Check a single ticket against one escalating transition's
    /// level timeout.
    ///
    /// Returns the breach only when the deadline has passed AND the
    /// ledger upsert says this scanner owns the escalation.
    async fn check_ticket(
        &self,
        ticket: &Ticket,
        level: EscalationLevel,
        timeout_secs: u64,
        now: DateTime<Utc>,
    ) -> CaseflowResult<Option<SlaBreach>> {
        // When did the ticket enter its current state? Tickets opened
        // directly into the initial state have no history row yet.
        let entered_at = self
            .store
            .latest_entry_into(&ticket.id, &ticket.current_state)
            .await?
            .map(|record| record.transitioned_at)
            .unwrap_or(ticket.created_at);

        let deadline = entered_at + Duration::seconds(timeout_secs as i64);
        if now <= deadline {
            return Ok(None);
        }

        if !self
            .ledger
            .try_record(&ticket.id, level, now, self.renotify_after)
            .await?
        {
            // Already escalated at this level within the window
            return Ok(None);
        }

        Ok(Some(SlaBreach {
            ticket_id: ticket.id.clone(),
            workflow_id: ticket.workflow_id.clone(),
            level,
            due_at: deadline,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use caseflow_store::{InMemoryEscalationLedger, InMemoryTicketStore};
    use caseflow_types::{
        CaseflowError, EscalationEntry, EventName, State, StateId, TeamId, Transition,
        TransitionRecord, UserId,
    };

    struct Fixture {
        registry: Arc<WorkflowRegistry>,
        store: Arc<InMemoryTicketStore>,
        ledger: Arc<InMemoryEscalationLedger>,
        events: Arc<EventBus>,
        workflow_id: WorkflowId,
    }

    /// New --triage--> Triaged --resolve--> Resolved, with level-1/2
    /// escalation on the triage SLA (3600s / 7200s)
    fn make_fixture() -> Fixture {
        let registry = Arc::new(WorkflowRegistry::new());
        let store = Arc::new(InMemoryTicketStore::new());
        let ledger = Arc::new(InMemoryEscalationLedger::new());
        let events = Arc::new(EventBus::default());

        let mut wf = Workflow::new("Support");
        wf.add_state(State::initial("new", "New")).unwrap();
        wf.add_state(State::new("triaged", "Triaged")).unwrap();
        wf.add_state(State::terminal("resolved", "Resolved")).unwrap();
        wf.add_transition(
            Transition::new(
                StateId::new("new"),
                EventName::new("triage"),
                StateId::new("triaged"),
            )
            .with_sla(3600)
            .with_escalation()
            .with_level_timeout(EscalationLevel::Level1, 3600)
            .with_level_timeout(EscalationLevel::Level2, 7200),
        )
        .unwrap();
        wf.add_transition(Transition::new(
            StateId::new("triaged"),
            EventName::new("resolve"),
            StateId::new("resolved"),
        ))
        .unwrap();
        let workflow_id = registry.register(wf).unwrap();

        Fixture {
            registry,
            store,
            ledger,
            events,
            workflow_id,
        }
    }

    fn make_scanner(fx: &Fixture, config: &SlaConfig) -> SlaScanner {
        SlaScanner::new(
            Arc::clone(&fx.registry),
            Arc::clone(&fx.store) as Arc<dyn TicketStore>,
            Arc::clone(&fx.ledger) as Arc<dyn EscalationLedger>,
            Arc::clone(&fx.events),
            config,
        )
    }

    /// A ticket opened into "new" at `opened_at`
    async fn open_ticket_at(fx: &Fixture, opened_at: DateTime<Utc>) -> Ticket {
        let mut ticket = Ticket::new(
            fx.workflow_id.clone(),
            TeamId::new("platform"),
            UserId::new("alice"),
            "Database is slow",
            StateId::new("new"),
        );
        ticket.created_at = opened_at;
        ticket.updated_at = opened_at;
        fx.store.create(ticket.clone()).await.unwrap();
        ticket
    }

    #[tokio::test]
    async fn test_breach_escalates_level1_exactly_once() {
        let fx = make_fixture();
        let scanner = make_scanner(&fx, &SlaConfig::default());
        let mut rx = fx.events.subscribe();

        let t0 = Utc::now();
        let ticket = open_ticket_at(&fx, t0).await;

        // One second past the level-1 deadline
        let report = scanner.scan(t0 + Duration::seconds(3601)).await;
        assert_eq!(report.breaches.len(), 1);
        assert_eq!(report.breaches[0].level, EscalationLevel::Level1);
        assert_eq!(report.breaches[0].due_at, t0 + Duration::seconds(3600));

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            TicketEvent::SlaViolated { level: EscalationLevel::Level1, .. }
        ));

        let entry = fx
            .ledger
            .get(&ticket.id, EscalationLevel::Level1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            entry,
            EscalationEntry::new(
                ticket.id.clone(),
                EscalationLevel::Level1,
                t0 + Duration::seconds(3601)
            )
        );

        // Second tick a minute later: level 1 must NOT re-fire
        let report = scanner.scan(t0 + Duration::seconds(3660)).await;
        assert!(report.breaches.is_empty());
        assert_eq!(fx.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_level2_evaluated_independently() {
        let fx = make_fixture();
        let scanner = make_scanner(&fx, &SlaConfig::default());

        let t0 = Utc::now();
        let ticket = open_ticket_at(&fx, t0).await;

        scanner.scan(t0 + Duration::seconds(3601)).await;

        // Past the level-2 timeout: level 2 fires, level 1 stays quiet
        let report = scanner.scan(t0 + Duration::seconds(7201)).await;
        assert_eq!(report.breaches.len(), 1);
        assert_eq!(report.breaches[0].level, EscalationLevel::Level2);

        assert!(fx
            .ledger
            .get(&ticket.id, EscalationLevel::Level2)
            .await
            .unwrap()
            .is_some());
        // Level 3 has no timeout configured, so it never fires
        assert!(fx
            .ledger
            .get(&ticket.id, EscalationLevel::Level3)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_within_sla_no_breach() {
        let fx = make_fixture();
        let scanner = make_scanner(&fx, &SlaConfig::default());

        let t0 = Utc::now();
        open_ticket_at(&fx, t0).await;

        // Exactly at the deadline is not yet a breach
        let report = scanner.scan(t0 + Duration::seconds(3600)).await;
        assert!(report.breaches.is_empty());
        assert!(fx.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_measured_from_state_entry_not_creation() {
        let fx = make_fixture();
        let scanner = make_scanner(&fx, &SlaConfig::default());

        let t0 = Utc::now() - Duration::days(30);
        let ticket = open_ticket_at(&fx, t0).await;

        // The ticket bounced out of and back into "new" recently; the
        // re-entry resets the clock.
        let now = Utc::now();
        fx.store
            .commit_transition(
                &ticket.id,
                0,
                TransitionRecord::new(
                    ticket.id.clone(),
                    EventName::new("triage"),
                    StateId::new("new"),
                    StateId::new("triaged"),
                    now - Duration::seconds(600),
                    Some(3600),
                ),
            )
            .await
            .unwrap();
        fx.store
            .commit_transition(
                &ticket.id,
                1,
                TransitionRecord::new(
                    ticket.id.clone(),
                    EventName::new("reopen"),
                    StateId::new("triaged"),
                    StateId::new("new"),
                    now - Duration::seconds(300),
                    None,
                ),
            )
            .await
            .unwrap();

        let report = scanner.scan(now).await;
        assert!(report.breaches.is_empty());
    }

    #[tokio::test]
    async fn test_ticket_in_non_escalating_state_ignored() {
        let fx = make_fixture();
        let scanner = make_scanner(&fx, &SlaConfig::default());

        let t0 = Utc::now() - Duration::days(30);
        let ticket = open_ticket_at(&fx, t0).await;
        // Move it to "triaged" — the resolve transition has no escalation
        fx.store
            .commit_transition(
                &ticket.id,
                0,
                TransitionRecord::new(
                    ticket.id.clone(),
                    EventName::new("triage"),
                    StateId::new("new"),
                    StateId::new("triaged"),
                    t0,
                    Some(3600),
                ),
            )
            .await
            .unwrap();

        let report = scanner.scan(Utc::now()).await;
        assert!(report.breaches.is_empty());
        assert_eq!(report.tickets_checked, 0);
    }

    #[tokio::test]
    async fn test_renotify_window_refires() {
        let fx = make_fixture();
        let config = SlaConfig {
            renotify_after_secs: Some(1800),
            ..Default::default()
        };
        let scanner = make_scanner(&fx, &config);

        let t0 = Utc::now();
        open_ticket_at(&fx, t0).await;

        let first = scanner.scan(t0 + Duration::seconds(3601)).await;
        assert_eq!(first.breaches.len(), 1);

        // Within the re-notify window: quiet
        let second = scanner.scan(t0 + Duration::seconds(3700)).await;
        assert!(second.breaches.is_empty());

        // Past the window: level 1 fires again
        let third = scanner.scan(t0 + Duration::seconds(3601 + 1900)).await;
        assert_eq!(third.breaches.len(), 1);
        assert_eq!(third.breaches[0].level, EscalationLevel::Level1);
    }

    /// Ledger stub that fails for one poisoned ticket
    struct PoisonedLedger {
        inner: InMemoryEscalationLedger,
        poisoned: TicketId,
    }

    #[async_trait]
    impl EscalationLedger for PoisonedLedger {
        async fn try_record(
            &self,
            ticket_id: &TicketId,
            level: EscalationLevel,
            now: DateTime<Utc>,
            renotify_after: Option<Duration>,
        ) -> CaseflowResult<bool> {
            if ticket_id == &self.poisoned {
                return Err(CaseflowError::Storage("ledger unavailable".into()));
            }
            self.inner.try_record(ticket_id, level, now, renotify_after).await
        }

        async fn get(
            &self,
            ticket_id: &TicketId,
            level: EscalationLevel,
        ) -> CaseflowResult<Option<EscalationEntry>> {
            self.inner.get(ticket_id, level).await
        }

        async fn prune_ticket(&self, ticket_id: &TicketId) -> CaseflowResult<usize> {
            self.inner.prune_ticket(ticket_id).await
        }
    }

    #[tokio::test]
    async fn test_one_ticket_error_does_not_abort_scan() {
        let fx = make_fixture();
        let t0 = Utc::now();
        let poisoned = open_ticket_at(&fx, t0).await;
        let healthy = open_ticket_at(&fx, t0).await;

        let scanner = SlaScanner::new(
            Arc::clone(&fx.registry),
            Arc::clone(&fx.store) as Arc<dyn TicketStore>,
            Arc::new(PoisonedLedger {
                inner: InMemoryEscalationLedger::new(),
                poisoned: poisoned.id.clone(),
            }),
            Arc::clone(&fx.events),
            &SlaConfig::default(),
        );

        let report = scanner.scan(t0 + Duration::seconds(3601)).await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.breaches.len(), 1);
        assert_eq!(report.breaches[0].ticket_id, healthy.id);
    }
}
