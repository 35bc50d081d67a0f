// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Workflow Engine
//!
//! Drives one run through the fixed pipeline: PM, QUALIFIER, ARCHITECT,
//! DEVELOPER, TESTER, WRITER. Steps never reorder and never run in parallel.
//! Per step the engine resolves the executing agent, negotiates a signed
//! binding when a remote card matched, invokes the step, persists its
//! artifact to the blackboard, fires the checkpoint (grafts, then judge
//! gating where configured) and moves on.
//!
//! ## Halting semantics
//!
//! | Event | Run ends as |
//! |-------|-------------|
//! | step returns `StepOutcome::Escalated` | `ESCALATED` |
//! | judge veto (default policy) | `ESCALATED` |
//! | judge veto with `veto_fails_run` | `FAILED` |
//! | invoke error, schema violation, judge error | `FAILED` |
//! | all six steps complete | `DONE` |
//!
//! Escalation is a value a step returns, never an error: defects fail the
//! run, requests for human judgment escalate it.

use chrono::Utc;
use metrics::counter;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::binding_service::CapabilityBindingService;
use crate::application::blackboard_service::BlackboardService;
use crate::application::graft_engine::GraftEngine;
use crate::application::judge::JudgeService;
use crate::application::registry::AgentRegistry;
use crate::domain::blackboard::ESCALATION_KEY;
use crate::domain::events::RunEvent;
use crate::domain::graft::GraftSpec;
use crate::domain::invoker::AgentInvoker;
use crate::domain::repository::{RepositoryError, RunRepository};
use crate::domain::role::{AgentRole, PIPELINE_SEQUENCE};
use crate::domain::run::{Run, RunContext, RunState, StepOutcome};
use crate::domain::verdict::Verdict;
use crate::infrastructure::event_bus::EventBus;

/// Engine policy knobs.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Checkpoints whose artifacts are judged before the pipeline proceeds.
    pub judged_checkpoints: Vec<String>,
    /// When true a judge veto fails the run instead of escalating it.
    pub veto_fails_run: bool,
    /// Capabilities demanded from candidates, per role. Roles without an
    /// entry discover with an empty requirement set.
    pub required_capabilities: HashMap<AgentRole, Vec<String>>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            judged_checkpoints: vec![AgentRole::Developer.checkpoint().to_string()],
            veto_fails_run: false,
            required_capabilities: HashMap::new(),
        }
    }
}

/// Errors surfaced to the caller of [`WorkflowEngine::execute`]. Step-level
/// problems are absorbed into the run's terminal state; only infrastructure
/// faults bubble up.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Executes runs over the fixed pipeline.
pub struct WorkflowEngine {
    registry: Arc<AgentRegistry>,
    bindings: Arc<CapabilityBindingService>,
    blackboard: Arc<BlackboardService>,
    grafts: Arc<GraftEngine>,
    judge: Arc<JudgeService>,
    runs: Arc<dyn RunRepository>,
    invoker: Arc<dyn AgentInvoker>,
    events: EventBus,
    config: WorkflowConfig,
}

impl WorkflowEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<AgentRegistry>,
        bindings: Arc<CapabilityBindingService>,
        blackboard: Arc<BlackboardService>,
        grafts: Arc<GraftEngine>,
        judge: Arc<JudgeService>,
        runs: Arc<dyn RunRepository>,
        invoker: Arc<dyn AgentInvoker>,
        events: EventBus,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            registry,
            bindings,
            blackboard,
            grafts,
            judge,
            runs,
            invoker,
            events,
            config,
        }
    }

    /// Execute one full run for `(repository, issue_number)`, with `grafts`
    /// attached up front. Returns the run in its terminal state.
    pub async fn execute(
        &self,
        repository: &str,
        issue_number: u64,
        grafts: Vec<GraftSpec>,
    ) -> Result<Run, WorkflowError> {
        let mut run = Run::new(repository, issue_number);
        for spec in grafts {
            run.attach_graft(spec);
        }
        let mut context = RunContext::new();
        counter!("workflow_runs_total").increment(1);
        info!(run_id = %run.id, repository, issue_number, "Run started");
        self.runs.save(&run).await?;

        for role in PIPELINE_SEQUENCE {
            match self.execute_step(&mut run, role, &mut context).await? {
                StepDisposition::Continue => {}
                StepDisposition::Halted => return Ok(run),
            }
        }

        run.finish(RunState::Done);
        self.runs.save(&run).await?;
        counter!("workflow_runs_completed_total").increment(1);
        info!(run_id = %run.id, "Run completed");
        self.events.publish(RunEvent::RunCompleted {
            run_id: run.id,
            at: Utc::now(),
        });
        Ok(run)
    }

    async fn execute_step(
        &self,
        run: &mut Run,
        role: AgentRole,
        context: &mut RunContext,
    ) -> Result<StepDisposition, WorkflowError> {
        let required = self
            .config
            .required_capabilities
            .get(&role)
            .cloned()
            .unwrap_or_default();

        // None means no registered agent matched; the step runs on the local
        // built-in implementation without a binding.
        let card = self.registry.discover_for_role(role, &required);
        let binding = card
            .as_ref()
            .map(|c| self.bindings.negotiate(c, &required, run.id));
        if let Some(b) = &binding {
            if !self.bindings.verify_binding(b) {
                self.bindings.revoke_binding(b.id, "verification failed");
                return self
                    .fail_run(run, role, "binding failed verification before dispatch")
                    .await;
            }
        }

        let agent_identity = card
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| role.as_str().to_string());
        run.begin_step(role, agent_identity.clone());
        self.runs.save(run).await?;
        self.events.publish(RunEvent::StepStarted {
            run_id: run.id,
            role,
            agent: agent_identity,
            at: Utc::now(),
        });

        let outcome = self
            .invoker
            .invoke_step(run, role, card.as_ref(), context)
            .await;
        if let Some(b) = &binding {
            self.bindings.revoke_binding(b.id, "step finished");
        }

        let payload = match outcome {
            Ok(StepOutcome::Completed(payload)) => payload,
            Ok(StepOutcome::Escalated(rationale)) => {
                return self.escalate_run(run, role, rationale).await;
            }
            Err(e) => {
                return self.fail_run(run, role, &e.to_string()).await;
            }
        };

        // Producer-gated, schema-validated write. A rejected artifact is a
        // step defect.
        if let Err(e) = self
            .blackboard
            .write(run.id, role.artifact_key(), role.as_str(), payload.clone())
        {
            return self.fail_run(run, role, &e.to_string()).await;
        }
        run.record_artifact(role.artifact_key(), payload);

        let checkpoint = role.checkpoint();
        self.events.publish(RunEvent::CheckpointReached {
            run_id: run.id,
            checkpoint: checkpoint.to_string(),
            at: Utc::now(),
        });
        self.grafts.process_checkpoint(run, checkpoint).await;
        self.runs.save(run).await?;

        if self
            .config
            .judged_checkpoints
            .iter()
            .any(|c| c == checkpoint)
        {
            return self.gate_on_verdict(run, role, checkpoint).await;
        }
        Ok(StepDisposition::Continue)
    }

    /// Judge the step's artifact and decide whether the pipeline proceeds.
    async fn gate_on_verdict(
        &self,
        run: &mut Run,
        role: AgentRole,
        checkpoint: &str,
    ) -> Result<StepDisposition, WorkflowError> {
        let verdict = match self
            .judge
            .evaluate(run.id, checkpoint, role.artifact_key())
            .await
        {
            Ok(v) => v,
            Err(e) => {
                // An unusable judge is an infrastructure defect, not a
                // quality signal.
                return self.fail_run(run, role, &e.to_string()).await;
            }
        };

        match verdict.verdict {
            Verdict::Pass => Ok(StepDisposition::Continue),
            Verdict::ConditionalPass => {
                warn!(
                    run_id = %run.id,
                    checkpoint,
                    score = verdict.overall_score,
                    "Conditional pass; proceeding with reservations on record"
                );
                Ok(StepDisposition::Continue)
            }
            Verdict::Veto => {
                if self.config.veto_fails_run {
                    return self.fail_run(run, role, "judge vetoed the artifact").await;
                }
                self.escalate_run(
                    run,
                    role,
                    json!({
                        "reason": "judge veto",
                        "checkpoint": checkpoint,
                        "overall_score": verdict.overall_score,
                        "confidence": verdict.confidence,
                    }),
                )
                .await
            }
        }
    }

    async fn escalate_run(
        &self,
        run: &mut Run,
        role: AgentRole,
        rationale: serde_json::Value,
    ) -> Result<StepDisposition, WorkflowError> {
        // Escalation writes are producer-exempt by policy.
        if let Err(e) = self
            .blackboard
            .write(run.id, ESCALATION_KEY, role.as_str(), rationale)
        {
            warn!(run_id = %run.id, error = %e, "Failed to persist escalation rationale");
        }
        run.finish(RunState::Escalated);
        self.runs.save(run).await?;
        counter!("workflow_runs_escalated_total").increment(1);
        info!(run_id = %run.id, step = %role, "Run escalated for human resolution");
        self.events.publish(RunEvent::RunEscalated {
            run_id: run.id,
            step: role,
            at: Utc::now(),
        });
        Ok(StepDisposition::Halted)
    }

    async fn fail_run(
        &self,
        run: &mut Run,
        role: AgentRole,
        reason: &str,
    ) -> Result<StepDisposition, WorkflowError> {
        run.finish(RunState::Failed);
        self.runs.save(run).await?;
        counter!("workflow_runs_failed_total").increment(1);
        warn!(run_id = %run.id, step = %role, reason, "Run failed");
        self.events.publish(RunEvent::RunFailed {
            run_id: run.id,
            step: role,
            reason: reason.to_string(),
            at: Utc::now(),
        });
        Ok(StepDisposition::Halted)
    }
}

enum StepDisposition {
    Continue,
    Halted,
}
