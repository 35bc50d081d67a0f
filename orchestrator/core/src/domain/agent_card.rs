// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Cards
//!
//! An `AgentCard` is the registry's record of one remote agent
//! implementation: who it is, what role it fills, which capabilities it
//! declares, and the resource constraints it operates under. Cards are
//! immutable values; re-registering a name replaces the whole record.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::role::AgentRole;

/// Health status reported by (or inferred for) a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentHealth {
    Active,
    Degraded,
    Inactive,
}

/// Resource constraints an agent declares for a single delegation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConstraints {
    /// Token budget for the delegated step, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Wall-clock budget for the delegated step, if declared.
    #[serde(default, with = "humantime_serde::option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<Duration>,
    /// Cost ceiling in USD cents, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_budget_cents: Option<u64>,
}

impl Default for AgentConstraints {
    fn default() -> Self {
        Self {
            max_tokens: None,
            max_duration: None,
            cost_budget_cents: None,
        }
    }
}

/// Registry entry for one agent implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCard {
    /// Unique agent name (registry key).
    pub name: String,
    pub version: String,
    /// Pipeline role this agent can fill.
    pub role: AgentRole,
    /// Declared capability set (free-form capability identifiers).
    pub capabilities: Vec<String>,
    /// Blackboard key the agent's output is written under.
    pub output_key: String,
    /// Transport hint for the invoker (e.g. "http", "grpc", "local").
    pub transport: String,
    #[serde(default)]
    pub constraints: AgentConstraints,
    pub health: AgentHealth,
}

impl AgentCard {
    /// Convenience constructor for an active card with default constraints.
    pub fn new(name: impl Into<String>, role: AgentRole, capabilities: Vec<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            role,
            capabilities,
            output_key: role.artifact_key().to_string(),
            transport: "http".to_string(),
            constraints: AgentConstraints::default(),
            health: AgentHealth::Active,
        }
    }

    pub fn with_health(mut self, health: AgentHealth) -> Self {
        self.health = health;
        self
    }

    pub fn with_constraints(mut self, constraints: AgentConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn declares(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}
