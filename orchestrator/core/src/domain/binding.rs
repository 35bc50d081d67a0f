// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Bindings
//!
//! An `AgentBinding` is a signed, time-boxed delegation: it authorizes one
//! named agent to act in one role for one run, within declared constraints.
//! Bindings are immutable values; "active" vs "revoked" is represented by
//! presence in the binding service's active map, never by mutating the value.
//!
//! The signature covers the canonical tuple
//! `bindingId|runId|agent|role|issuedAt|expiresAt` (pipe-separated, RFC 3339
//! timestamps) so that mutating any identifying field invalidates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::agent_card::AgentConstraints;
use crate::domain::role::AgentRole;
use crate::domain::run::RunId;

/// Unique identifier for a delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingId(pub Uuid);

impl BindingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed, time-boxed delegation of one role to one agent for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBinding {
    pub id: BindingId,
    pub run_id: RunId,
    pub agent_name: String,
    pub role: AgentRole,
    /// Capabilities the agent declared on its card at negotiation time.
    pub declared_capabilities: Vec<String>,
    /// Capabilities the step required.
    pub required_capabilities: Vec<String>,
    /// Constraints copied from the card so budget checks outlive registry churn.
    pub constraints: AgentConstraints,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Hex-encoded HMAC-SHA256 over [`AgentBinding::signing_payload`].
    pub signature: String,
}

impl AgentBinding {
    /// Canonical byte string the HMAC signature is computed over. Field order
    /// and separators are part of the wire contract; changing them breaks
    /// every outstanding binding.
    pub fn signing_payload(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.id,
            self.run_id,
            self.agent_name,
            self.role,
            self.issued_at.to_rfc3339(),
            self.expires_at.to_rfc3339(),
        )
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Error)]
pub enum BindingError {
    /// Raised by screening when discovery finds no usable candidate.
    /// Non-retryable: the step must fall back or fail.
    #[error("No candidate agent found for role {role} with capabilities {required:?}")]
    NoCandidate {
        role: AgentRole,
        required: Vec<String>,
    },

    /// The binding service was constructed without signing key material.
    #[error("Binding signing key is not configured; refusing to issue unsigned delegations")]
    MissingSigningKey,
}
