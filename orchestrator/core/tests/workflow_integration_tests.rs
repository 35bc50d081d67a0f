// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! Full-pipeline integration tests: real schema registry, real blackboard
//! access policy, real judge aggregation, mock agent transport and LLM.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use relay_orchestrator_core::application::binding_service::{
    BindingConfig, CapabilityBindingService,
};
use relay_orchestrator_core::application::blackboard_service::BlackboardService;
use relay_orchestrator_core::application::graft_engine::{GraftEngine, GraftEngineConfig};
use relay_orchestrator_core::application::judge::{JudgeConfig, JudgeService};
use relay_orchestrator_core::application::registry::AgentRegistry;
use relay_orchestrator_core::application::workflow_engine::{WorkflowConfig, WorkflowEngine};
use relay_orchestrator_core::domain::agent_card::AgentCard;
use relay_orchestrator_core::domain::blackboard::{AccessPolicy, JUDGE_VERDICT_KEY};
use relay_orchestrator_core::domain::graft::{GraftSpec, GraftStatus};
use relay_orchestrator_core::domain::invoker::{AgentInvoker, InvokeError};
use relay_orchestrator_core::domain::llm::{CompletionError, CompletionOptions, CompletionProvider};
use relay_orchestrator_core::domain::role::{AgentRole, ORCHESTRATOR_IDENTITY};
use relay_orchestrator_core::domain::run::{Run, RunContext, RunState, StepOutcome};
use relay_orchestrator_core::domain::verdict::RUBRIC;
use relay_orchestrator_core::infrastructure::event_bus::EventBus;
use relay_orchestrator_core::infrastructure::repositories::InMemoryRunRepository;
use relay_orchestrator_core::infrastructure::schema_registry::SchemaRegistry;

/// Produces schema-conformant artifacts for every step. `corrupt_developer`
/// makes the developer emit a payload the implementation_diff schema rejects.
struct ConformantInvoker {
    corrupt_developer: bool,
}

#[async_trait]
impl AgentInvoker for ConformantInvoker {
    async fn invoke_step(
        &self,
        _run: &Run,
        role: AgentRole,
        _card: Option<&AgentCard>,
        _context: &mut RunContext,
    ) -> Result<StepOutcome, InvokeError> {
        let payload = match role {
            AgentRole::Pm => json!({
                "summary": "add retry to the upload client",
                "acceptance_criteria": ["uploads retry three times"]
            }),
            AgentRole::Qualifier => json!({"feasible": true, "notes": "small change"}),
            AgentRole::Architect => json!({
                "approach": "wrap the client call in a bounded retry loop",
                "affected_files": ["src/upload.rs"]
            }),
            AgentRole::Developer if self.corrupt_developer => json!({"patch": "wrong shape"}),
            AgentRole::Developer => json!({"diff": "+retry(3, upload)", "files_changed": 1}),
            AgentRole::Tester => json!({"passed": 12, "failed": 0, "log": "all green"}),
            AgentRole::Writer => json!({"changelog": "upload retries added"}),
        };
        Ok(StepOutcome::Completed(payload))
    }

    async fn invoke_graft(
        &self,
        _run: &Run,
        _agent_name: &str,
        _checkpoint: &str,
    ) -> Result<Value, InvokeError> {
        Ok(json!({"findings": []}))
    }
}

/// Judge answering every criterion at one fixed level.
struct FixedJudge(&'static str);

#[async_trait]
impl CompletionProvider for FixedJudge {
    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        _options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        unimplemented!()
    }

    async fn complete_structured(
        &self,
        _system: &str,
        _user: &str,
        _schema: &Value,
        _options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let mut obj = serde_json::Map::new();
        for criterion in RUBRIC {
            obj.insert(
                criterion.as_str().to_string(),
                json!({"level": self.0, "evidence": "integration fixture"}),
            );
        }
        Ok(Value::Object(obj).to_string())
    }
}

fn engine(
    corrupt_developer: bool,
    judge_level: &'static str,
) -> (WorkflowEngine, Arc<BlackboardService>) {
    let events = EventBus::with_default_capacity();
    let registry = Arc::new(AgentRegistry::new());
    let blackboard = Arc::new(BlackboardService::new(
        AccessPolicy::pipeline_default(),
        Arc::new(SchemaRegistry::with_builtin_schemas().expect("builtin schemas compile")),
        events.clone(),
    ));
    let invoker: Arc<dyn AgentInvoker> = Arc::new(ConformantInvoker { corrupt_developer });
    let engine = WorkflowEngine::new(
        registry.clone(),
        Arc::new(CapabilityBindingService::new(
            registry.clone(),
            BindingConfig::new("integration-secret").expect("non-empty secret"),
        )),
        blackboard.clone(),
        Arc::new(GraftEngine::new(
            registry.clone(),
            invoker.clone(),
            events.clone(),
            GraftEngineConfig::default(),
        )),
        Arc::new(JudgeService::new(
            Arc::new(FixedJudge(judge_level)),
            blackboard.clone(),
            events.clone(),
            JudgeConfig::default(),
        )),
        Arc::new(InMemoryRunRepository::new()),
        invoker,
        events,
        WorkflowConfig::default(),
    );
    (engine, blackboard)
}

#[tokio::test]
async fn full_pipeline_with_schema_validation_completes() {
    let (engine, blackboard) = engine(false, "good");
    let run = engine
        .execute("https://github.com/acme/uploader.git", 17, vec![])
        .await
        .unwrap();

    assert_eq!(run.state, RunState::Done);
    for role in relay_orchestrator_core::domain::role::PIPELINE_SEQUENCE {
        let artifact = blackboard
            .read_latest(run.id, role.artifact_key(), ORCHESTRATOR_IDENTITY)
            .unwrap()
            .unwrap_or_else(|| panic!("missing artifact {}", role.artifact_key()));
        assert_eq!(artifact.produced_by, role.as_str());
        assert_eq!(artifact.version, 1);
    }

    let verdict = blackboard
        .read_latest(run.id, JUDGE_VERDICT_KEY, ORCHESTRATOR_IDENTITY)
        .unwrap()
        .unwrap();
    assert_eq!(verdict.payload["verdict"], "pass");
    assert_eq!(verdict.payload["checkpoint"], "after_developer");
}

#[tokio::test]
async fn schema_violation_fails_the_run_at_the_offending_step() {
    let (engine, blackboard) = engine(true, "good");
    let run = engine.execute("github.com/acme/uploader", 18, vec![]).await.unwrap();

    assert_eq!(run.state, RunState::Failed);
    // Steps before the developer persisted; the rejected diff did not.
    assert!(blackboard
        .read_latest(run.id, "architecture_notes", ORCHESTRATOR_IDENTITY)
        .unwrap()
        .is_some());
    assert!(blackboard
        .read_latest(run.id, "implementation_diff", ORCHESTRATOR_IDENTITY)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn veto_escalates_and_preserves_the_artifact_for_review() {
    let (engine, blackboard) = engine(false, "failing");
    let run = engine.execute("github.com/acme/uploader", 19, vec![]).await.unwrap();

    assert_eq!(run.state, RunState::Escalated);
    let escalation = blackboard
        .read_latest(run.id, "escalation", ORCHESTRATOR_IDENTITY)
        .unwrap()
        .unwrap();
    assert_eq!(escalation.payload["reason"], "judge veto");
    // The vetoed artifact stays available to the human reviewer.
    assert!(blackboard
        .read_latest(run.id, "implementation_diff", ORCHESTRATOR_IDENTITY)
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn grafts_run_at_checkpoints_and_leave_records() {
    let events = EventBus::with_default_capacity();
    let registry = Arc::new(AgentRegistry::new());
    registry.register(AgentCard::new(
        "dep-audit",
        AgentRole::Tester,
        vec!["sca".to_string()],
    ));
    let blackboard = Arc::new(BlackboardService::new(
        AccessPolicy::pipeline_default(),
        Arc::new(SchemaRegistry::with_builtin_schemas().expect("builtin schemas compile")),
        events.clone(),
    ));
    let invoker: Arc<dyn AgentInvoker> = Arc::new(ConformantInvoker {
        corrupt_developer: false,
    });
    let engine = WorkflowEngine::new(
        registry.clone(),
        Arc::new(CapabilityBindingService::new(
            registry.clone(),
            BindingConfig::new("integration-secret").expect("non-empty secret"),
        )),
        blackboard.clone(),
        Arc::new(GraftEngine::new(
            registry.clone(),
            invoker.clone(),
            events.clone(),
            GraftEngineConfig::default(),
        )),
        Arc::new(JudgeService::new(
            Arc::new(FixedJudge("good")),
            blackboard,
            events.clone(),
            JudgeConfig::default(),
        )),
        Arc::new(InMemoryRunRepository::new()),
        invoker,
        events,
        WorkflowConfig {
            judged_checkpoints: vec![],
            ..WorkflowConfig::default()
        },
    );

    let run = engine
        .execute(
            "github.com/acme/uploader",
            20,
            vec![GraftSpec::new("dep-audit", "after_qualifier")],
        )
        .await
        .unwrap();

    assert_eq!(run.state, RunState::Done);
    assert_eq!(run.executed_grafts.len(), 1);
    assert_eq!(run.executed_grafts[0].status, GraftStatus::Completed);
    assert!(run.artifacts.contains_key("graft_dep-audit"));
}
