// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Run Events
//!
//! Domain events published on the in-memory bus as a run progresses. Events
//! are fire-and-forget: slow or absent subscribers never block the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::graft::{GraftId, GraftStatus};
use crate::domain::interrupt::{InterruptAction, InterruptTier};
use crate::domain::role::AgentRole;
use crate::domain::run::RunId;
use crate::domain::verdict::Verdict;

/// Everything observers can learn about a run's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    StepStarted {
        run_id: RunId,
        role: AgentRole,
        agent: String,
        at: DateTime<Utc>,
    },
    CheckpointReached {
        run_id: RunId,
        checkpoint: String,
        at: DateTime<Utc>,
    },
    ArtifactWritten {
        run_id: RunId,
        key: String,
        version: u64,
        produced_by: String,
        at: DateTime<Utc>,
    },
    GuardrailTriggered {
        run_id: RunId,
        rule_name: String,
        tier: InterruptTier,
        action: InterruptAction,
        tool: String,
        at: DateTime<Utc>,
    },
    GraftStarted {
        run_id: RunId,
        graft_id: GraftId,
        agent: String,
        checkpoint: String,
        attempt: u32,
        at: DateTime<Utc>,
    },
    GraftFinished {
        run_id: RunId,
        graft_id: GraftId,
        agent: String,
        status: GraftStatus,
        at: DateTime<Utc>,
    },
    VerdictRecorded {
        run_id: RunId,
        checkpoint: String,
        verdict: Verdict,
        overall_score: f64,
        confidence: f64,
        at: DateTime<Utc>,
    },
    RunCompleted {
        run_id: RunId,
        at: DateTime<Utc>,
    },
    RunEscalated {
        run_id: RunId,
        step: AgentRole,
        at: DateTime<Utc>,
    },
    RunFailed {
        run_id: RunId,
        step: AgentRole,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl RunEvent {
    /// Run the event belongs to, for run-scoped subscription filtering.
    pub fn run_id(&self) -> RunId {
        match self {
            RunEvent::StepStarted { run_id, .. }
            | RunEvent::CheckpointReached { run_id, .. }
            | RunEvent::ArtifactWritten { run_id, .. }
            | RunEvent::GuardrailTriggered { run_id, .. }
            | RunEvent::GraftStarted { run_id, .. }
            | RunEvent::GraftFinished { run_id, .. }
            | RunEvent::VerdictRecorded { run_id, .. }
            | RunEvent::RunCompleted { run_id, .. }
            | RunEvent::RunEscalated { run_id, .. }
            | RunEvent::RunFailed { run_id, .. } => *run_id,
        }
    }
}
