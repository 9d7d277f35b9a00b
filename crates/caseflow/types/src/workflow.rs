//! Workflow graphs: the configuration tickets move through
//!
//! A Workflow is a directed graph where states are the vertices and
//! event-named transitions are the edges. `(source state, event)` is
//! unique within a workflow, so routing is deterministic. Definitions
//! are configuration: authored by administrators, consumed read-only by
//! the engine, and rejected at registration time if malformed.

use crate::{
    CaseflowError, CaseflowResult, EscalationLevel, EventName, LevelTimeouts, StateId, WorkflowId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── State ────────────────────────────────────────────────────────────

/// A state (vertex) in a workflow graph
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Unique identifier within the workflow
    pub id: StateId,
    /// Human-readable name
    pub name: String,
    /// Whether new tickets enter the workflow here — exactly one per workflow
    pub is_initial: bool,
    /// Whether tickets in this state are closed (no further transitions expected)
    pub is_final: bool,
}

impl State {
    /// Create an intermediate state (neither initial nor final)
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: StateId::new(id),
            name: name.into(),
            is_initial: false,
            is_final: false,
        }
    }

    /// Create the initial state
    pub fn initial(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            is_initial: true,
            ..Self::new(id, name)
        }
    }

    /// Create a final (terminal) state
    pub fn terminal(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            is_final: true,
            ..Self::new(id, name)
        }
    }
}

// ── Transition ───────────────────────────────────────────────────────

/// A transition (edge) in a workflow graph.
///
/// Fires when the named event is applied to a ticket sitting in the
/// source state, moving it to the target state. Optionally carries an
/// SLA duration (used to stamp the due date on the history record) and
/// per-level escalation timeouts evaluated by the SLA scanner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// The state this transition fires from
    pub source: StateId,
    /// The event that triggers it
    pub event: EventName,
    /// The state it moves the ticket to
    pub target: StateId,
    /// SLA for acting on a ticket in the source state, in seconds.
    /// `None` means the transition carries no SLA.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_duration_secs: Option<u64>,
    /// Whether an overdue ticket in the source state escalates
    pub escalate_on_violation: bool,
    /// Explicit per-level escalation timeouts, measured from entry into
    /// the source state
    #[serde(default)]
    pub escalation_timeouts: LevelTimeouts,
}

impl Transition {
    /// Create a transition with no SLA and no escalation
    pub fn new(source: StateId, event: EventName, target: StateId) -> Self {
        Self {
            source,
            event,
            target,
            sla_duration_secs: None,
            escalate_on_violation: false,
            escalation_timeouts: LevelTimeouts::none(),
        }
    }

    /// Attach an SLA duration (seconds)
    pub fn with_sla(mut self, secs: u64) -> Self {
        self.sla_duration_secs = Some(secs);
        self
    }

    /// Enable escalation on SLA violation
    pub fn with_escalation(mut self) -> Self {
        self.escalate_on_violation = true;
        self
    }

    /// Set the escalation timeout for one level (seconds)
    pub fn with_level_timeout(mut self, level: EscalationLevel, secs: u64) -> Self {
        self.escalation_timeouts = self.escalation_timeouts.with_level(level, secs);
        self
    }

    pub fn has_sla(&self) -> bool {
        self.sla_duration_secs.is_some()
    }

    /// The timeout after which this transition escalates at the given
    /// level, if escalation applies at that level
    pub fn escalates_at(&self, level: EscalationLevel) -> Option<u64> {
        if !self.escalate_on_violation {
            return None;
        }
        self.escalation_timeouts.for_level(level)
    }
}

// ── Workflow ─────────────────────────────────────────────────────────

/// A workflow definition — states, transitions, and the routing table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier
    pub id: WorkflowId,
    /// Human-readable name
    pub name: String,
    /// Description of what this workflow handles
    pub description: String,
    /// The states, in registration order
    pub states: Vec<State>,
    /// The transitions, in registration order
    pub transitions: Vec<Transition>,
    /// When this definition was created
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new empty workflow definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::generate(),
            name: name.into(),
            description: String::new(),
            states: Vec::new(),
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: WorkflowId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a state to the graph
    pub fn add_state(&mut self, state: State) -> CaseflowResult<()> {
        if self.states.iter().any(|s| s.id == state.id) {
            return Err(CaseflowError::DuplicateStateId(state.id));
        }
        self.states.push(state);
        Ok(())
    }

    /// Add a transition to the graph.
    ///
    /// Both endpoints must already be registered states, and
    /// `(source, event)` must not collide with an existing transition.
    pub fn add_transition(&mut self, transition: Transition) -> CaseflowResult<()> {
        if !self.states.iter().any(|s| s.id == transition.source) {
            return Err(CaseflowError::UnknownStateRef(transition.source));
        }
        if !self.states.iter().any(|s| s.id == transition.target) {
            return Err(CaseflowError::UnknownStateRef(transition.target));
        }
        if self
            .transitions
            .iter()
            .any(|t| t.source == transition.source && t.event == transition.event)
        {
            return Err(CaseflowError::DuplicateTransition {
                state: transition.source,
                event: transition.event,
            });
        }
        self.transitions.push(transition);
        Ok(())
    }

    /// Get a state by id
    pub fn state(&self, id: &StateId) -> Option<&State> {
        self.states.iter().find(|s| &s.id == id)
    }

    /// The single initial state of this workflow.
    ///
    /// Fails if the invariant does not hold; on a registered (validated)
    /// workflow this always succeeds.
    pub fn initial_state(&self) -> CaseflowResult<&State> {
        let mut initials = self.states.iter().filter(|s| s.is_initial);
        let first = initials.next().ok_or(CaseflowError::NoInitialState)?;
        let extra = initials.count();
        if extra > 0 {
            return Err(CaseflowError::MultipleInitialStates(extra + 1));
        }
        Ok(first)
    }

    /// Resolve `(source state, event)` to its transition, if defined
    pub fn transition_from(&self, source: &StateId, event: &EventName) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| &t.source == source && &t.event == event)
    }

    /// Resolve `(source state, event)` to the target state.
    ///
    /// An undefined pair is a normal outcome, reported as
    /// `NoSuchTransition` — callers asking "is this event valid from
    /// here" must not treat it as a system error.
    pub fn resolve(&self, source: &StateId, event: &EventName) -> CaseflowResult<&State> {
        let transition = self
            .transition_from(source, event)
            .ok_or_else(|| CaseflowError::NoSuchTransition {
                state: source.clone(),
                event: event.clone(),
            })?;
        self.state(&transition.target)
            .ok_or_else(|| CaseflowError::UnknownStateRef(transition.target.clone()))
    }

    /// All transitions leaving a state, in registration order
    pub fn transitions_from(&self, source: &StateId) -> Vec<&Transition> {
        self.transitions
            .iter()
            .filter(|t| &t.source == source)
            .collect()
    }

    /// The states reachable from `source` in one transition, in
    /// transition-registration order, de-duplicated. Drives UI choices.
    pub fn valid_target_states(&self, source: &StateId) -> Vec<&State> {
        let mut seen = HashSet::new();
        self.transitions
            .iter()
            .filter(|t| &t.source == source)
            .filter(|t| seen.insert(&t.target))
            .filter_map(|t| self.state(&t.target))
            .collect()
    }

    /// Validate the workflow definition for structural correctness.
    ///
    /// Violations are fatal at load time: a workflow that fails here
    /// must not be activated.
    pub fn validate(&self) -> CaseflowResult<()> {
        if self.states.is_empty() {
            return Err(CaseflowError::NoInitialState);
        }

        // Exactly one initial state
        let initial_count = self.states.iter().filter(|s| s.is_initial).count();
        if initial_count == 0 {
            return Err(CaseflowError::NoInitialState);
        }
        if initial_count > 1 {
            return Err(CaseflowError::MultipleInitialStates(initial_count));
        }

        // State ids are unique
        let mut seen_states = HashSet::new();
        for state in &self.states {
            if !seen_states.insert(&state.id) {
                return Err(CaseflowError::DuplicateStateId(state.id.clone()));
            }
        }

        // Transitions reference known states and route deterministically
        let mut seen_routes = HashSet::new();
        for transition in &self.transitions {
            if !seen_states.contains(&transition.source) {
                return Err(CaseflowError::UnknownStateRef(transition.source.clone()));
            }
            if !seen_states.contains(&transition.target) {
                return Err(CaseflowError::UnknownStateRef(transition.target.clone()));
            }
            if !seen_routes.insert((&transition.source, &transition.event)) {
                return Err(CaseflowError::DuplicateTransition {
                    state: transition.source.clone(),
                    event: transition.event.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_triage_workflow() -> Workflow {
        let mut wf = Workflow::new("Support Requests")
            .with_description("Incoming support tickets");

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
            .with_level_timeout(EscalationLevel::Level1, 3600),
        )
        .unwrap();
        wf.add_transition(Transition::new(
            StateId::new("triaged"),
            EventName::new("resolve"),
            StateId::new("resolved"),
        ))
        .unwrap();

        wf
    }

    #[test]
    fn test_valid_workflow() {
        let wf = make_triage_workflow();
        assert!(wf.validate().is_ok());
        assert_eq!(wf.state_count(), 3);
        assert_eq!(wf.transition_count(), 2);
        assert_eq!(wf.initial_state().unwrap().id, StateId::new("new"));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let wf = make_triage_workflow();
        let from = StateId::new("new");
        let event = EventName::new("triage");

        for _ in 0..3 {
            let target = wf.resolve(&from, &event).unwrap();
            assert_eq!(target.id, StateId::new("triaged"));
        }
    }

    #[test]
    fn test_resolve_undefined_pair() {
        let wf = make_triage_workflow();
        let result = wf.resolve(&StateId::new("new"), &EventName::new("resolve"));
        assert!(matches!(
            result,
            Err(CaseflowError::NoSuchTransition { .. })
        ));
    }

    #[test]
    fn test_valid_target_states_in_registration_order() {
        let mut wf = Workflow::new("Branching");
        wf.add_state(State::initial("open", "Open")).unwrap();
        wf.add_state(State::new("review", "Review")).unwrap();
        wf.add_state(State::terminal("closed", "Closed")).unwrap();

        wf.add_transition(Transition::new(
            StateId::new("open"),
            EventName::new("submit"),
            StateId::new("review"),
        ))
        .unwrap();
        wf.add_transition(Transition::new(
            StateId::new("open"),
            EventName::new("discard"),
            StateId::new("closed"),
        ))
        .unwrap();
        // A second route to "review" must not duplicate it in the result
        wf.add_transition(Transition::new(
            StateId::new("open"),
            EventName::new("fast-track"),
            StateId::new("review"),
        ))
        .unwrap();

        let targets: Vec<&str> = wf
            .valid_target_states(&StateId::new("open"))
            .iter()
            .map(|s| s.id.0.as_str())
            .collect();
        assert_eq!(targets, vec!["review", "closed"]);
    }

    #[test]
    fn test_no_initial_state_rejected() {
        let mut wf = Workflow::new("Bad");
        wf.add_state(State::new("a", "A")).unwrap();
        wf.add_state(State::terminal("b", "B")).unwrap();
        assert!(matches!(
            wf.validate(),
            Err(CaseflowError::NoInitialState)
        ));
    }

    #[test]
    fn test_two_initial_states_rejected() {
        let mut wf = Workflow::new("Bad");
        wf.add_state(State::initial("a", "A")).unwrap();
        wf.add_state(State::initial("b", "B")).unwrap();
        assert!(matches!(
            wf.validate(),
            Err(CaseflowError::MultipleInitialStates(2))
        ));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut wf = Workflow::new("Dup");
        wf.add_state(State::initial("a", "A")).unwrap();
        wf.add_state(State::new("b", "B")).unwrap();
        wf.add_state(State::new("c", "C")).unwrap();

        wf.add_transition(Transition::new(
            StateId::new("a"),
            EventName::new("go"),
            StateId::new("b"),
        ))
        .unwrap();
        // Same (source, event) to a different target: nondeterministic routing
        let result = wf.add_transition(Transition::new(
            StateId::new("a"),
            EventName::new("go"),
            StateId::new("c"),
        ));
        assert!(matches!(
            result,
            Err(CaseflowError::DuplicateTransition { .. })
        ));
    }

    #[test]
    fn test_transition_to_unknown_state_rejected() {
        let mut wf = Workflow::new("Dangling");
        wf.add_state(State::initial("a", "A")).unwrap();
        let result = wf.add_transition(Transition::new(
            StateId::new("a"),
            EventName::new("go"),
            StateId::new("nowhere"),
        ));
        assert!(matches!(result, Err(CaseflowError::UnknownStateRef(_))));
    }

    #[test]
    fn test_escalates_at_requires_flag_and_timeout() {
        let plain = Transition::new(
            StateId::new("a"),
            EventName::new("go"),
            StateId::new("a"),
        )
        .with_level_timeout(EscalationLevel::Level1, 60);
        // Timeout configured but escalation flag off
        assert_eq!(plain.escalates_at(EscalationLevel::Level1), None);

        let escalating = plain.clone().with_escalation();
        assert_eq!(escalating.escalates_at(EscalationLevel::Level1), Some(60));
        assert_eq!(escalating.escalates_at(EscalationLevel::Level2), None);
    }
}
