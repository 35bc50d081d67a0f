// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0

pub mod binding_service;
pub mod blackboard_service;
pub mod graft_engine;
pub mod interrupt_evaluator;
pub mod judge;
pub mod registry;
pub mod repo_scheduler;
pub mod workflow_engine;

// Re-export the services most callers wire together
pub use binding_service::{BindingConfig, CapabilityBindingService};
pub use blackboard_service::BlackboardService;
pub use graft_engine::{GraftEngine, GraftEngineConfig};
pub use interrupt_evaluator::{GuardrailConfig, InterruptEvaluator};
pub use judge::{ArbitrationOutcome, ConflictPosition, JudgeConfig, JudgeService};
pub use registry::AgentRegistry;
pub use repo_scheduler::RepositoryScheduler;
pub use workflow_engine::{WorkflowConfig, WorkflowEngine};
