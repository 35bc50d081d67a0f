// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Blackboard Domain Model
//!
//! The blackboard is the agents' only communication channel: a keyed,
//! versioned artifact store with a static producer/consumer matrix. Who may
//! write a key and who may read it is configuration, fixed before any run
//! starts — never negotiated at runtime.
//!
//! ## Access rules
//!
//! | Operation | Allowed when |
//! |-----------|--------------|
//! | write(K) as A | `A == producer(K)`, or `K == "escalation"` |
//! | read(K) as A | `A ∈ consumers(K)` or `A == "orchestrator"` |
//!
//! Violations are typed, non-retryable errors and are logged as
//! security-relevant by the service layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::domain::role::{AgentRole, JUDGE_IDENTITY};
use crate::domain::run::RunId;

/// Key every step may write its escalation rationale under.
pub const ESCALATION_KEY: &str = "escalation";

/// Reserved key judge verdicts are written under.
pub const JUDGE_VERDICT_KEY: &str = "judge_verdict";

// ============================================================================
// Versioned entries
// ============================================================================

/// One version of one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactVersion {
    /// 1-indexed, strictly increasing per (run, key).
    pub version: u64,
    /// Identity of the writing agent.
    pub produced_by: String,
    pub payload: Value,
    pub written_at: DateTime<Utc>,
}

/// All versions of one key within one run, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardEntry {
    pub run_id: RunId,
    pub key: String,
    pub versions: Vec<ArtifactVersion>,
}

impl BlackboardEntry {
    pub fn latest(&self) -> Option<&ArtifactVersion> {
        self.versions.last()
    }
}

// ============================================================================
// Static access policy
// ============================================================================

/// Producer/consumer matrix plus the schema assignment per key.
///
/// Built once at startup; the service layer holds it immutably.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    producers: BTreeMap<String, String>,
    consumers: BTreeMap<String, BTreeSet<String>>,
    schemas: BTreeMap<String, String>,
}

impl AccessPolicy {
    pub fn builder() -> AccessPolicyBuilder {
        AccessPolicyBuilder::default()
    }

    /// The default pipeline matrix: each role produces its own artifact key;
    /// downstream roles consume what they need to do their job.
    pub fn pipeline_default() -> Self {
        let all_downstream = |from: usize| -> Vec<&'static str> {
            crate::domain::role::PIPELINE_SEQUENCE[from..]
                .iter()
                .map(|r| r.as_str())
                .collect()
        };
        let mut b = Self::builder()
            .key("ticket_plan", AgentRole::Pm.as_str(), all_downstream(1))
            .key("qualification_report", AgentRole::Qualifier.as_str(), all_downstream(2))
            .key("architecture_notes", AgentRole::Architect.as_str(), all_downstream(3))
            .key("implementation_diff", AgentRole::Developer.as_str(), all_downstream(4))
            .key("test_report", AgentRole::Tester.as_str(), all_downstream(5))
            .key("documentation", AgentRole::Writer.as_str(), vec![])
            .key(JUDGE_VERDICT_KEY, JUDGE_IDENTITY, vec![AgentRole::Developer.as_str()]);
        // Escalation is producer-exempt, but it still needs a consumer set and
        // a schema entry.
        b = b.key(ESCALATION_KEY, "", vec![]).schema(ESCALATION_KEY, "escalation");
        for role in crate::domain::role::PIPELINE_SEQUENCE {
            b = b.schema(role.artifact_key(), role.artifact_key());
        }
        b.schema(JUDGE_VERDICT_KEY, "judge_verdict").build()
    }

    pub fn producer(&self, key: &str) -> Option<&str> {
        self.producers.get(key).map(String::as_str)
    }

    pub fn may_write(&self, key: &str, agent: &str) -> bool {
        if key == ESCALATION_KEY {
            return true;
        }
        self.producer(key) == Some(agent)
    }

    pub fn may_read(&self, key: &str, agent: &str) -> bool {
        if agent == crate::domain::role::ORCHESTRATOR_IDENTITY {
            return true;
        }
        self.consumers
            .get(key)
            .map(|set| set.contains(agent))
            .unwrap_or(false)
    }

    /// Name of the schema a key's payloads are validated against, if any.
    pub fn schema_for(&self, key: &str) -> Option<&str> {
        self.schemas.get(key).map(String::as_str)
    }

    pub fn is_known_key(&self, key: &str) -> bool {
        self.producers.contains_key(key)
    }
}

#[derive(Debug, Default)]
pub struct AccessPolicyBuilder {
    producers: BTreeMap<String, String>,
    consumers: BTreeMap<String, BTreeSet<String>>,
    schemas: BTreeMap<String, String>,
}

impl AccessPolicyBuilder {
    pub fn key(
        mut self,
        key: impl Into<String>,
        producer: impl Into<String>,
        consumers: Vec<&str>,
    ) -> Self {
        let key = key.into();
        self.producers.insert(key.clone(), producer.into());
        self.consumers
            .insert(key, consumers.into_iter().map(String::from).collect());
        self
    }

    pub fn schema(mut self, key: impl Into<String>, schema_name: impl Into<String>) -> Self {
        self.schemas.insert(key.into(), schema_name.into());
        self
    }

    pub fn build(self) -> AccessPolicy {
        AccessPolicy {
            producers: self.producers,
            consumers: self.consumers,
            schemas: self.schemas,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum BlackboardError {
    /// Write by a non-producer or read by a non-consumer. Fatal to the
    /// operation, never retried.
    #[error("Access denied: agent '{agent}' may not {operation} key '{key}'")]
    AccessDenied {
        agent: String,
        key: String,
        operation: &'static str,
    },

    #[error("Unknown blackboard key '{0}'")]
    UnknownKey(String),

    /// Payload rejected by the key's schema. Fatal to the write.
    #[error("Schema validation failed for key '{key}': {detail}")]
    SchemaViolation { key: String, detail: String },

    #[error("Persistence error: {0}")]
    Persistence(String),
}
