//! Workflow registry: stores and retrieves validated workflow graphs
//!
//! Definitions are immutable once registered. Validation happens here,
//! at load time — a workflow violating the graph invariants (no initial
//! state, dangling references, ambiguous routing) is rejected and never
//! activates.

use caseflow_types::{CaseflowError, CaseflowResult, State, StateId, Workflow, WorkflowId};
use dashmap::DashMap;
use std::sync::Arc;

/// Registry of workflow definitions, shared read-mostly across the
/// executor and the SLA scanner
pub struct WorkflowRegistry {
    workflows: DashMap<WorkflowId, Arc<Workflow>>,
}

impl WorkflowRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            workflows: DashMap::new(),
        }
    }

    /// Register a workflow definition.
    ///
    /// Validates the graph before storing. Returns the workflow id.
    pub fn register(&self, workflow: Workflow) -> CaseflowResult<WorkflowId> {
        workflow.validate()?;

        let id = workflow.id.clone();
        self.workflows.insert(id.clone(), Arc::new(workflow));

        tracing::info!(workflow_id = %id, "Workflow registered");
        Ok(id)
    }

    /// Get a workflow by id
    pub fn get(&self, id: &WorkflowId) -> CaseflowResult<Arc<Workflow>> {
        self.workflows
            .get(id)
            .map(|w| Arc::clone(&w))
            .ok_or_else(|| CaseflowError::WorkflowNotFound(id.clone()))
    }

    /// The reachable target states from a state of a workflow, in
    /// transition-registration order — the UI's "what can happen next"
    pub fn valid_target_states(
        &self,
        workflow_id: &WorkflowId,
        state: &StateId,
    ) -> CaseflowResult<Vec<State>> {
        let workflow = self.get(workflow_id)?;
        if workflow.state(state).is_none() {
            return Err(CaseflowError::StateNotFound {
                workflow: workflow_id.clone(),
                state: state.clone(),
            });
        }
        Ok(workflow
            .valid_target_states(state)
            .into_iter()
            .cloned()
            .collect())
    }

    /// All registered workflows
    pub fn list(&self) -> Vec<Arc<Workflow>> {
        self.workflows.iter().map(|w| Arc::clone(&w)).collect()
    }

    /// All registered workflow ids
    pub fn ids(&self) -> Vec<WorkflowId> {
        self.workflows.iter().map(|w| w.id.clone()).collect()
    }

    /// Number of registered workflows
    pub fn count(&self) -> usize {
        self.workflows.len()
    }

    /// Check whether a workflow is registered
    pub fn contains(&self, id: &WorkflowId) -> bool {
        self.workflows.contains_key(id)
    }

    /// Remove a workflow definition
    pub fn remove(&self, id: &WorkflowId) -> CaseflowResult<Arc<Workflow>> {
        let (_, workflow) = self
            .workflows
            .remove(id)
            .ok_or_else(|| CaseflowError::WorkflowNotFound(id.clone()))?;

        tracing::info!(workflow_id = %id, "Workflow removed");
        Ok(workflow)
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
