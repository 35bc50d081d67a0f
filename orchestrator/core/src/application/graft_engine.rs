// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Graft Execution Engine
//!
//! Runs attached agents when their checkpoint is reached, with per-agent
//! fault isolation: a wall-clock timeout on every attempt, a bounded linear
//! retry, and a per-agent circuit breaker. A graft can delay its run but
//! never abort it — every terminal status is recorded on the run and the
//! pipeline moves on.
//!
//! A spec's agent name resolves through the registry first, then through
//! role discovery when the name is a pipeline role or a role's default
//! agent. Timeouts and generic failures are counted separately on the
//! execution record; both count toward the breaker threshold.

use chrono::Utc;
use dashmap::DashMap;
use metrics::counter;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::application::registry::AgentRegistry;
use crate::domain::agent_card::AgentCard;
use crate::domain::events::RunEvent;
use crate::domain::graft::{GraftExecution, GraftRecord, GraftSpec, GraftState, GraftStatus};
use crate::domain::invoker::AgentInvoker;
use crate::domain::role::{AgentRole, PIPELINE_SEQUENCE};
use crate::domain::run::Run;
use crate::infrastructure::event_bus::EventBus;

// ============================================================================
// Circuit breaker
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    opened_at: Option<Instant>,
}

/// Per-agent circuit breaker. Opens after `failure_threshold` consecutive
/// failures; after `reset_timeout` one probe attempt is allowed (half-open),
/// and its outcome decides between closing and re-opening.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    failure_count: AtomicU32,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            failure_count: AtomicU32::new(0),
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                opened_at: None,
            }),
        }
    }

    /// Whether an execution may be attempted right now. Transitions
    /// Open -> HalfOpen once the reset window has elapsed.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.state = BreakerState::Closed;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        // A failed half-open probe re-opens immediately.
        if count >= self.failure_threshold || inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).state
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Tunable execution policy.
#[derive(Debug, Clone)]
pub struct GraftEngineConfig {
    /// Default per-attempt wall-clock limit; a spec may override it.
    pub default_timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Linear backoff base: attempt N waits N * base before retrying.
    pub retry_base_delay: Duration,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_timeout: Duration,
}

impl Default for GraftEngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(300),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            breaker_failure_threshold: 5,
            breaker_reset_timeout: Duration::from_secs(300),
        }
    }
}

/// Executes pending grafts at their checkpoints.
pub struct GraftEngine {
    registry: Arc<AgentRegistry>,
    invoker: Arc<dyn AgentInvoker>,
    events: EventBus,
    config: GraftEngineConfig,
    /// One breaker per graft agent name, shared across runs.
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl GraftEngine {
    pub fn new(
        registry: Arc<AgentRegistry>,
        invoker: Arc<dyn AgentInvoker>,
        events: EventBus,
        config: GraftEngineConfig,
    ) -> Self {
        Self {
            registry,
            invoker,
            events,
            config,
            breakers: DashMap::new(),
        }
    }

    /// Execute every pending graft attached to `checkpoint`, in attachment
    /// order, and record the outcomes on the run. Returns the records
    /// produced by this pass.
    pub async fn process_checkpoint(&self, run: &mut Run, checkpoint: &str) -> Vec<GraftRecord> {
        let due: Vec<GraftSpec> = run
            .pending_grafts
            .iter()
            .filter(|spec| spec.after == checkpoint)
            .cloned()
            .collect();

        let mut records = Vec::with_capacity(due.len());
        for spec in due {
            let record = self.execute_one(run, &spec).await;
            counter!("graft_executions_total").increment(1);
            self.events.publish(RunEvent::GraftFinished {
                run_id: run.id,
                graft_id: spec.id,
                agent: spec.agent_name.clone(),
                status: record.status.clone(),
                at: Utc::now(),
            });
            if record.status == GraftStatus::CircuitOpen {
                // Deliberate skip: the spec stays pending for a later
                // checkpoint, only the record is appended.
                run.executed_grafts.push(record.clone());
            } else {
                run.retire_graft(record.clone());
            }
            records.push(record);
        }
        records
    }

    async fn execute_one(&self, run: &mut Run, spec: &GraftSpec) -> GraftRecord {
        let attempt_timeout = spec.timeout.unwrap_or(self.config.default_timeout);
        let mut execution = GraftExecution::new(spec, run.id, attempt_timeout);

        let Some(card) = self.resolve_agent(&spec.agent_name) else {
            warn!(graft_id = %spec.id, agent = %spec.agent_name, "Graft agent not resolvable");
            execution.state = GraftState::Failed;
            execution.error = Some(format!(
                "agent '{}' not found in registry and no role fallback matched",
                spec.agent_name
            ));
            return record_of(spec, &execution);
        };
        execution.agent_name = card.name.clone();

        let breaker = self.breaker_for(&card.name);
        if !breaker.can_execute() {
            warn!(
                run_id = %run.id,
                graft_id = %spec.id,
                agent = %card.name,
                "Circuit open; skipping graft"
            );
            execution.state = GraftState::CircuitOpen;
            execution.error = Some("circuit open".to_string());
            return record_of(spec, &execution);
        }

        for attempt in 1..=(1 + self.config.max_retries) {
            execution.state = GraftState::Running;
            self.events.publish(RunEvent::GraftStarted {
                run_id: run.id,
                graft_id: spec.id,
                agent: card.name.clone(),
                checkpoint: spec.after.clone(),
                attempt,
                at: Utc::now(),
            });

            match timeout(
                attempt_timeout,
                self.invoker.invoke_graft(run, &card.name, &spec.after),
            )
            .await
            {
                Ok(Ok(payload)) => {
                    breaker.record_success();
                    let key = artifact_key(&card.name);
                    run.record_artifact(key.clone(), payload);
                    info!(
                        run_id = %run.id,
                        graft_id = %spec.id,
                        agent = %card.name,
                        artifact = %key,
                        attempt,
                        "Graft completed"
                    );
                    execution.state = GraftState::Completed;
                    execution.output_artifact = Some(key);
                    execution.error = None;
                    return record_of(spec, &execution);
                }
                Ok(Err(e)) => {
                    execution.retry_count += 1;
                    execution.error = Some(e.to_string());
                    breaker.record_failure();
                    warn!(graft_id = %spec.id, attempt, error = %e, "Graft attempt failed");
                }
                Err(_) => {
                    execution.timeout_count += 1;
                    execution.error = Some(format!("timed out after {attempt_timeout:?}"));
                    breaker.record_failure();
                    warn!(graft_id = %spec.id, attempt, timeout = ?attempt_timeout, "Graft attempt timed out");
                }
            }

            if attempt <= self.config.max_retries {
                tokio::time::sleep(self.config.retry_base_delay * attempt).await;
            }
        }

        // Exhausted: the dominant failure mode names the terminal status.
        execution.state = if execution.timeout_count > execution.retry_count {
            GraftState::Timeout
        } else {
            GraftState::Failed
        };
        warn!(
            run_id = %run.id,
            graft_id = %spec.id,
            agent = %card.name,
            retries = execution.retry_count,
            timeouts = execution.timeout_count,
            "Graft exhausted its attempts"
        );
        record_of(spec, &execution)
    }

    /// Resolve the agent a spec names: exact registry hit first, then role
    /// discovery when the name parses as a pipeline role or matches a role's
    /// default agent.
    fn resolve_agent(&self, name: &str) -> Option<AgentCard> {
        if let Some(card) = self.registry.get(name) {
            return Some(card);
        }
        let role = AgentRole::parse(name).ok().or_else(|| fallback_role(name))?;
        self.registry.discover_for_role(role, &[])
    }

    fn breaker_for(&self, agent_name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(agent_name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    self.config.breaker_failure_threshold,
                    self.config.breaker_reset_timeout,
                ))
            })
            .clone()
    }

    /// Breaker state for an agent, for operator introspection.
    pub fn breaker_state(&self, agent_name: &str) -> Option<BreakerState> {
        self.breakers.get(agent_name).map(|b| b.state())
    }
}

/// Blackboard-style key graft outputs are recorded under.
fn artifact_key(agent_name: &str) -> String {
    format!("graft_{agent_name}")
}

/// Fixed name → role map for specs naming a role's default agent.
fn fallback_role(name: &str) -> Option<AgentRole> {
    PIPELINE_SEQUENCE
        .iter()
        .copied()
        .find(|role| role.default_agent() == name)
}

fn record_of(spec: &GraftSpec, execution: &GraftExecution) -> GraftRecord {
    GraftRecord {
        spec: spec.clone(),
        status: execution.status().unwrap_or(GraftStatus::Failed),
        artifact_key: execution.output_artifact.clone(),
        error: execution.error.clone(),
        finished_at: Utc::now(),
    }
}
