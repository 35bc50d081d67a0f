// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Pipeline Roles
//!
//! The pipeline is a closed set of six roles executed in a fixed order, plus
//! two privileged identities (`JUDGE`, `orchestrator`) that never occupy a
//! step slot. Role strings coming from configuration are parsed up front; an
//! unknown role is a configuration error, never a runtime dispatch failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the six pipeline step roles.
///
/// The enum is deliberately closed: every mapping over it (`artifact_key`,
/// `checkpoint`, `default_agent`) is total, so adding a role is a compile
/// error until all tables are updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRole {
    Pm,
    Qualifier,
    Architect,
    Developer,
    Tester,
    Writer,
}

/// Fixed execution order of the pipeline.
pub const PIPELINE_SEQUENCE: [AgentRole; 6] = [
    AgentRole::Pm,
    AgentRole::Qualifier,
    AgentRole::Architect,
    AgentRole::Developer,
    AgentRole::Tester,
    AgentRole::Writer,
];

/// Privileged identity allowed to read every blackboard key.
pub const ORCHESTRATOR_IDENTITY: &str = "orchestrator";

/// Identity the judge writes verdicts under.
pub const JUDGE_IDENTITY: &str = "JUDGE";

impl AgentRole {
    /// Canonical uppercase name, used as the agent identity in access checks.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Pm => "PM",
            AgentRole::Qualifier => "QUALIFIER",
            AgentRole::Architect => "ARCHITECT",
            AgentRole::Developer => "DEVELOPER",
            AgentRole::Tester => "TESTER",
            AgentRole::Writer => "WRITER",
        }
    }

    /// Blackboard key this role's step output is persisted under.
    pub fn artifact_key(&self) -> &'static str {
        match self {
            AgentRole::Pm => "ticket_plan",
            AgentRole::Qualifier => "qualification_report",
            AgentRole::Architect => "architecture_notes",
            AgentRole::Developer => "implementation_diff",
            AgentRole::Tester => "test_report",
            AgentRole::Writer => "documentation",
        }
    }

    /// Checkpoint name reached once this role's step completes. Grafts attach
    /// to these names via their `after` field.
    pub fn checkpoint(&self) -> &'static str {
        match self {
            AgentRole::Pm => "after_pm",
            AgentRole::Qualifier => "after_qualifier",
            AgentRole::Architect => "after_architect",
            AgentRole::Developer => "after_developer",
            AgentRole::Tester => "after_tester",
            AgentRole::Writer => "after_writer",
        }
    }

    /// Registry fallback: the agent name tried when capability discovery
    /// produces no match for this role.
    pub fn default_agent(&self) -> &'static str {
        match self {
            AgentRole::Pm => "relay-pm",
            AgentRole::Qualifier => "relay-qualifier",
            AgentRole::Architect => "relay-architect",
            AgentRole::Developer => "relay-developer",
            AgentRole::Tester => "relay-tester",
            AgentRole::Writer => "relay-writer",
        }
    }

    /// Parse a configured role string. Unknown strings are rejected here so
    /// downstream dispatch stays total.
    pub fn parse(s: &str) -> Result<Self, RoleError> {
        match s.to_ascii_uppercase().as_str() {
            "PM" => Ok(AgentRole::Pm),
            "QUALIFIER" => Ok(AgentRole::Qualifier),
            "ARCHITECT" => Ok(AgentRole::Architect),
            "DEVELOPER" => Ok(AgentRole::Developer),
            "TESTER" => Ok(AgentRole::Tester),
            "WRITER" => Ok(AgentRole::Writer),
            other => Err(RoleError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RoleError {
    #[error("Unknown pipeline role: {0}")]
    UnknownRole(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_sequence_order() {
        assert_eq!(PIPELINE_SEQUENCE[0], AgentRole::Pm);
        assert_eq!(PIPELINE_SEQUENCE[5], AgentRole::Writer);
        assert_eq!(PIPELINE_SEQUENCE.len(), 6);
    }

    #[test]
    fn test_parse_roundtrip() {
        for role in PIPELINE_SEQUENCE {
            assert_eq!(AgentRole::parse(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(AgentRole::parse("developer").unwrap(), AgentRole::Developer);
    }

    #[test]
    fn test_parse_rejects_unknown_role() {
        let err = AgentRole::parse("INTERN").unwrap_err();
        assert!(err.to_string().contains("INTERN"));
    }

    #[test]
    fn test_checkpoint_names_are_distinct() {
        let mut names: Vec<_> = PIPELINE_SEQUENCE.iter().map(|r| r.checkpoint()).collect();
        names.dedup();
        assert_eq!(names.len(), 6);
    }
}
