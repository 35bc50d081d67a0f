// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Binding (Application Service)
//!
//! Screens discovery candidates and negotiates signed, time-boxed
//! delegations. A binding's signature is HMAC-SHA256 over its canonical
//! payload; verification requires both a byte-for-byte signature match
//! (constant-time) and an unexpired window.
//!
//! The signing key is explicit configuration. There is no fallback constant:
//! constructing the service without key material is an error, by decision
//! recorded in DESIGN.md.

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::application::registry::AgentRegistry;
use crate::domain::agent_card::AgentCard;
use crate::domain::binding::{AgentBinding, BindingError, BindingId};
use crate::domain::role::AgentRole;
use crate::domain::run::RunId;

type HmacSha256 = Hmac<Sha256>;

/// Floor for delegation lifetime when the card declares nothing longer.
const DEFAULT_BINDING_TTL: Duration = Duration::from_secs(300);

/// Configuration for the binding service.
#[derive(Clone)]
pub struct BindingConfig {
    secret: Vec<u8>,
}

impl BindingConfig {
    /// Build from explicit key material. Empty secrets are rejected so a
    /// misconfigured deployment fails at startup, not at verification time.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, BindingError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(BindingError::MissingSigningKey);
        }
        Ok(Self { secret })
    }
}

impl std::fmt::Debug for BindingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material never appears in logs.
        f.debug_struct("BindingConfig").finish_non_exhaustive()
    }
}

/// Issues, verifies and revokes agent delegations.
pub struct CapabilityBindingService {
    registry: Arc<AgentRegistry>,
    config: BindingConfig,
    /// Active delegations; presence in this map *is* the active status.
    active: DashMap<BindingId, AgentBinding>,
}

impl CapabilityBindingService {
    pub fn new(registry: Arc<AgentRegistry>, config: BindingConfig) -> Self {
        Self {
            registry,
            config,
            active: DashMap::new(),
        }
    }

    /// Find the best candidate for a role. A declared-capability shortfall is
    /// logged but tolerated; no candidate at all is a non-retryable step
    /// error.
    pub fn screen_candidates(
        &self,
        role: AgentRole,
        required: &[String],
    ) -> Result<AgentCard, BindingError> {
        let card = self
            .registry
            .discover_for_role(role, required)
            .ok_or_else(|| BindingError::NoCandidate {
                role,
                required: required.to_vec(),
            })?;

        let missing: Vec<&String> = required
            .iter()
            .filter(|cap| !card.declares(cap))
            .collect();
        if !missing.is_empty() {
            warn!(
                agent = %card.name,
                role = %role,
                missing = ?missing,
                "Candidate declares a strict subset of required capabilities"
            );
        }
        Ok(card)
    }

    /// Issue a signed delegation for one run. The expiry window is the
    /// larger of the card's declared duration budget and the 5-minute floor.
    pub fn negotiate(
        &self,
        candidate: &AgentCard,
        required: &[String],
        run_id: RunId,
    ) -> AgentBinding {
        let ttl = candidate
            .constraints
            .max_duration
            .map(|d| d.max(DEFAULT_BINDING_TTL))
            .unwrap_or(DEFAULT_BINDING_TTL);
        let issued_at = Utc::now();
        let expires_at = issued_at
            + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::minutes(5));

        let mut binding = AgentBinding {
            id: BindingId::new(),
            run_id,
            agent_name: candidate.name.clone(),
            role: candidate.role,
            declared_capabilities: candidate.capabilities.clone(),
            required_capabilities: required.to_vec(),
            constraints: candidate.constraints.clone(),
            issued_at,
            expires_at,
            signature: String::new(),
        };
        binding.signature = self.sign(&binding.signing_payload());

        info!(
            binding_id = %binding.id,
            run_id = %run_id,
            agent = %binding.agent_name,
            role = %binding.role,
            expires_at = %binding.expires_at,
            "Negotiated agent binding"
        );
        self.active.insert(binding.id, binding.clone());
        binding
    }

    /// True iff the recomputed signature matches byte-for-byte and the
    /// binding has not expired. Any mutated field breaks the signature.
    pub fn verify_binding(&self, binding: &AgentBinding) -> bool {
        if binding.is_expired(Utc::now()) {
            return false;
        }
        let expected = self.sign(&binding.signing_payload());
        expected
            .as_bytes()
            .ct_eq(binding.signature.as_bytes())
            .into()
    }

    /// Remove a delegation from the active map. Idempotent: revoking an
    /// unknown or already-revoked binding is not an error.
    pub fn revoke_binding(&self, id: BindingId, reason: &str) {
        if self.active.remove(&id).is_some() {
            info!(binding_id = %id, reason = %reason, "Binding revoked");
        }
    }

    pub fn is_active(&self, id: BindingId) -> bool {
        self.active.contains_key(&id)
    }

    /// Count of currently active delegations.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    fn sign(&self, payload: &str) -> String {
        // Key length is unrestricted for HMAC; new_from_slice cannot fail.
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
