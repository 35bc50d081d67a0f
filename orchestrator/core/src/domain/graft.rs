// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Graft Domain Model
//!
//! A graft is an extra agent execution attached to a run at a named
//! checkpoint. The run carries two typed lists — pending specs and executed
//! records — serialized only at the persistence boundary, so pause/resume
//! works across process restarts.
//!
//! ## Execution state machine
//!
//! ```text
//! PENDING ──dispatch──▶ RUNNING ──success──▶ COMPLETED
//!    │                     │ ├──timeout──▶ TIMEOUT  (retryable)
//!    │                     │ └──error────▶ FAILED   (retryable)
//!    └──circuit open──▶ CIRCUIT_OPEN  (spec stays pending)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::run::RunId;

/// Unique identifier for one graft attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraftId(pub Uuid);

impl GraftId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraftId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GraftId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pending graft: which agent to run, after which checkpoint, and with
/// what timeout override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraftSpec {
    pub id: GraftId,
    /// Registry name of the agent to invoke.
    pub agent_name: String,
    /// Checkpoint the graft fires after (e.g. "after_developer").
    pub after: String,
    /// Per-graft wall-clock override; engine default applies when `None`.
    #[serde(default, with = "humantime_serde::option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl GraftSpec {
    pub fn new(agent_name: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            id: GraftId::new(),
            agent_name: agent_name.into(),
            after: after.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Live state of one graft execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraftState {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    CircuitOpen,
}

impl GraftState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GraftState::Pending | GraftState::Running)
    }
}

/// One attempt to run a graft, tracked by the engine while in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraftExecution {
    pub graft_id: GraftId,
    pub run_id: RunId,
    pub agent_name: String,
    pub checkpoint: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Retries consumed so far (generic failures).
    pub retry_count: u32,
    /// Timeouts consumed so far, counted separately from generic failures.
    pub timeout_count: u32,
    pub state: GraftState,
    /// Blackboard key the output artifact was written under, on success.
    pub output_artifact: Option<String>,
    pub error: Option<String>,
}

impl GraftExecution {
    pub fn new(spec: &GraftSpec, run_id: RunId, timeout: Duration) -> Self {
        Self {
            graft_id: spec.id,
            run_id,
            agent_name: spec.agent_name.clone(),
            checkpoint: spec.after.clone(),
            timeout,
            retry_count: 0,
            timeout_count: 0,
            state: GraftState::Pending,
            output_artifact: None,
            error: None,
        }
    }

    /// Terminal status for the run's executed list; `None` while in flight.
    pub fn status(&self) -> Option<GraftStatus> {
        match self.state {
            GraftState::Completed => Some(GraftStatus::Completed),
            GraftState::Failed => Some(GraftStatus::Failed),
            GraftState::Timeout => Some(GraftStatus::Timeout),
            GraftState::CircuitOpen => Some(GraftStatus::CircuitOpen),
            GraftState::Pending | GraftState::Running => None,
        }
    }
}

/// Terminal status recorded on the run's executed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GraftStatus {
    Completed,
    Failed,
    Timeout,
    /// Deliberate skip, recorded distinctly from failure; the spec stays on
    /// the pending list for a future checkpoint.
    CircuitOpen,
}

/// Entry in the run's executed-grafts list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraftRecord {
    pub spec: GraftSpec,
    pub status: GraftStatus,
    pub artifact_key: Option<String>,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}
