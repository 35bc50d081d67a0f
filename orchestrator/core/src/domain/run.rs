// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Run Aggregate
//!
//! A `Run` is one pipeline execution for one (repository, issue) pair. It is
//! owned exclusively by the workflow engine: every state transition happens
//! there, collaborating services only read it. The pending/executed graft
//! lists live on the run itself (not in engine memory) so a process restart
//! can resume graft processing from persisted state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::graft::{GraftRecord, GraftSpec};
use crate::domain::role::AgentRole;

// ============================================================================
// Value Objects: Identifiers
// ============================================================================

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Run State
// ============================================================================

/// Lifecycle state of a run.
///
/// `Done`, `Escalated` and `Failed` are terminal; a failed run is never
/// resumed, an escalated run waits for a human decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Created,
    Running(AgentRole),
    Done,
    Escalated,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Escalated | RunState::Failed)
    }
}

// ============================================================================
// Aggregate Root: Run
// ============================================================================

/// One pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    /// Repository the run operates on (normalized URL).
    pub repository: String,
    /// Issue number driving the run.
    pub issue_number: u64,
    pub state: RunState,
    /// Agent identity currently executing, if any.
    pub current_agent: Option<String>,
    /// Step artifacts accumulated so far, keyed by blackboard key.
    pub artifacts: HashMap<String, Value>,
    /// Grafts waiting for their checkpoint, in attachment order.
    pub pending_grafts: Vec<GraftSpec>,
    /// Grafts that reached a terminal state, in completion order.
    pub executed_grafts: Vec<GraftRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn new(repository: impl Into<String>, issue_number: u64) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            repository: repository.into(),
            issue_number,
            state: RunState::Created,
            current_agent: None,
            artifacts: HashMap::new(),
            pending_grafts: Vec::new(),
            executed_grafts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Enter a pipeline step: state and current agent move together.
    pub fn begin_step(&mut self, role: AgentRole, agent_name: impl Into<String>) {
        self.state = RunState::Running(role);
        self.current_agent = Some(agent_name.into());
        self.updated_at = Utc::now();
    }

    pub fn record_artifact(&mut self, key: impl Into<String>, payload: Value) {
        self.artifacts.insert(key.into(), payload);
        self.updated_at = Utc::now();
    }

    /// Attach a graft to run after a named checkpoint.
    pub fn attach_graft(&mut self, spec: GraftSpec) {
        self.pending_grafts.push(spec);
        self.updated_at = Utc::now();
    }

    /// Move a graft from the pending list to the executed list with its
    /// terminal record. No-op if the graft is not pending (already moved).
    pub fn retire_graft(&mut self, record: GraftRecord) {
        self.pending_grafts.retain(|g| g.id != record.spec.id);
        self.executed_grafts.push(record);
        self.updated_at = Utc::now();
    }

    pub fn finish(&mut self, state: RunState) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.current_agent = None;
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Run Context (transient working memory)
// ============================================================================

/// Per-run scratch space passed step to step. Never persisted on its own;
/// anything durable must be written to the blackboard as an artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    /// Raw issue payload fetched at run start.
    pub issue: Option<Value>,
    /// Working branch created for the run.
    pub branch_name: Option<String>,
    /// URL of the pull request, once opened.
    pub pr_url: Option<String>,
    /// Free-form intermediate notes keyed by producing step.
    pub notes: HashMap<String, String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// Step Outcome
// ============================================================================

/// Result of executing one pipeline step.
///
/// Escalation is a value, not an error: a step that wants a human decision
/// returns `Escalated` with its rationale payload and the engine halts the
/// run in `RunState::Escalated`. Genuine defects surface as `Err` from the
/// step executor and halt the run in `RunState::Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "payload", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Step produced its artifact payload.
    Completed(Value),
    /// Step requests human resolution; payload is the escalation rationale.
    Escalated(Value),
}
