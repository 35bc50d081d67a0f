// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Interrupt Domain Model
//!
//! Value objects for the runtime guardrail evaluator: the tool call under
//! inspection, the tiered decision it produces, and the non-blocking budget
//! warnings. Rule logic lives in `application::interrupt_evaluator`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the orchestrator does with the tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptAction {
    /// Execute normally.
    Proceed,
    /// Execute, but record and notify observers.
    NotifyAndProceed,
    /// Hold execution pending a human decision.
    PauseAndNotify,
    /// Refuse execution outright (secret exposure).
    Block,
}

/// Severity tier of the matched rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptTier {
    Critical,
    High,
    Medium,
    Low,
}

/// Outcome of evaluating one tool call. Exactly one decision per call; the
/// first matching rule in tier order wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptDecision {
    pub action: InterruptAction,
    pub tier: InterruptTier,
    /// Stable rule identifier (e.g. "protected_branch_push").
    pub rule_name: String,
    /// Human-readable explanation attached to pause/notify events.
    pub message: String,
}

impl InterruptDecision {
    pub fn proceed() -> Self {
        Self {
            action: InterruptAction::Proceed,
            tier: InterruptTier::Low,
            rule_name: "default".to_string(),
            message: "no rule matched".to_string(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(
            self.action,
            InterruptAction::Block | InterruptAction::PauseAndNotify
        )
    }
}

/// A tool invocation about to be executed on behalf of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name (e.g. "git_push", "file_write", "sql_execute").
    pub tool: String,
    /// Identity of the invoking agent.
    pub agent: String,
    /// Tool-specific arguments.
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, agent: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool: tool.into(),
            agent: agent.into(),
            arguments,
        }
    }

    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(Value::as_str)
    }

    pub fn bool_arg(&self, name: &str) -> bool {
        self.arguments
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn u64_arg(&self, name: &str) -> Option<u64> {
        self.arguments.get(name).and_then(Value::as_u64)
    }
}

/// Advisory emitted when a declared budget crosses its warning threshold.
/// Warnings never block execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetWarning {
    pub budget: &'static str,
    pub used: u64,
    pub limit: u64,
    /// Used/limit at emission time, in [0, 1] and possibly above 1.
    pub utilization: f64,
}
