//! Escalation levels and the idempotency-ledger entry type
//!
//! An SLA breach escalates through ordinal levels (1, 2, 3), each with
//! its own explicitly configured timeout. A `(ticket, level)` escalation
//! fires at most once; the `EscalationEntry` row is the guard.

use crate::TicketId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Escalation Level ─────────────────────────────────────────────────

/// Severity tier of an SLA breach notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EscalationLevel {
    Level1,
    Level2,
    Level3,
}

impl EscalationLevel {
    /// All levels in ascending severity order — the order the scanner
    /// evaluates them in
    pub const ALL: [EscalationLevel; 3] = [
        EscalationLevel::Level1,
        EscalationLevel::Level2,
        EscalationLevel::Level3,
    ];

    pub fn as_u8(self) -> u8 {
        match self {
            EscalationLevel::Level1 => 1,
            EscalationLevel::Level2 => 2,
            EscalationLevel::Level3 => 3,
        }
    }
}

impl std::fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "level {}", self.as_u8())
    }
}

// ── Level Timeouts ───────────────────────────────────────────────────

/// Per-level escalation timeouts for a transition, in seconds.
///
/// Each level is an independent, explicitly configured duration measured
/// from the ticket's entry into the transition's source state. A level
/// with no timeout is never evaluated by the scanner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTimeouts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level1_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level2_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level3_secs: Option<u64>,
}

impl LevelTimeouts {
    /// No escalation at any level
    pub fn none() -> Self {
        Self::default()
    }

    /// The configured timeout for a level, if any
    pub fn for_level(&self, level: EscalationLevel) -> Option<u64> {
        match level {
            EscalationLevel::Level1 => self.level1_secs,
            EscalationLevel::Level2 => self.level2_secs,
            EscalationLevel::Level3 => self.level3_secs,
        }
    }

    /// Set the timeout for a level (builder style)
    pub fn with_level(mut self, level: EscalationLevel, secs: u64) -> Self {
        match level {
            EscalationLevel::Level1 => self.level1_secs = Some(secs),
            EscalationLevel::Level2 => self.level2_secs = Some(secs),
            EscalationLevel::Level3 => self.level3_secs = Some(secs),
        }
        self
    }

    /// Whether any level is configured
    pub fn any_configured(&self) -> bool {
        self.level1_secs.is_some() || self.level2_secs.is_some() || self.level3_secs.is_some()
    }
}

// ── Ledger Entry ─────────────────────────────────────────────────────

/// A row in the escalation idempotency ledger.
///
/// Created once per `(ticket, level)` by the SLA scanner, never updated
/// except by an explicit re-notify refresh, optionally pruned after the
/// ticket closes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationEntry {
    pub ticket_id: TicketId,
    pub level: EscalationLevel,
    pub escalated_at: DateTime<Utc>,
}

impl EscalationEntry {
    pub fn new(ticket_id: TicketId, level: EscalationLevel, escalated_at: DateTime<Utc>) -> Self {
        Self {
            ticket_id,
            level,
            escalated_at,
        }
    }
}
