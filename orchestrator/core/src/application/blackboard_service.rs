// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Blackboard Service (Application Layer)
//!
//! Mediates every artifact read and write: access control first, then schema
//! validation, then the versioned append. Versions are immutable once
//! written; a re-write of a key appends the next version, it never replaces.
//!
//! Denied operations are logged at WARN with the offending identity — they
//! are the blackboard's security signal.

use chrono::Utc;
use dashmap::DashMap;
use metrics::counter;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::blackboard::{
    AccessPolicy, ArtifactVersion, BlackboardEntry, BlackboardError,
};
use crate::domain::run::RunId;
use crate::domain::schema::SchemaValidator;
use crate::infrastructure::event_bus::EventBus;

/// Versioned, access-controlled artifact store for in-flight runs.
pub struct BlackboardService {
    policy: AccessPolicy,
    validator: Arc<dyn SchemaValidator>,
    events: EventBus,
    /// (run, key) -> versions, oldest first.
    store: DashMap<(RunId, String), Vec<ArtifactVersion>>,
}

impl BlackboardService {
    pub fn new(policy: AccessPolicy, validator: Arc<dyn SchemaValidator>, events: EventBus) -> Self {
        Self {
            policy,
            validator,
            events,
            store: DashMap::new(),
        }
    }

    /// Append a new version of `key` on behalf of `agent`.
    ///
    /// Returns the version number assigned (1-indexed). Fails without side
    /// effects on unknown keys, access violations, and schema violations.
    pub fn write(
        &self,
        run_id: RunId,
        key: &str,
        agent: &str,
        payload: Value,
    ) -> Result<u64, BlackboardError> {
        if !self.policy.is_known_key(key) {
            return Err(BlackboardError::UnknownKey(key.to_string()));
        }
        if !self.policy.may_write(key, agent) {
            warn!(
                run_id = %run_id,
                agent = %agent,
                key = %key,
                "Blackboard write denied: agent is not the producer"
            );
            counter!("blackboard_access_denied_total").increment(1);
            return Err(BlackboardError::AccessDenied {
                agent: agent.to_string(),
                key: key.to_string(),
                operation: "write",
            });
        }
        if let Some(schema_name) = self.policy.schema_for(key) {
            self.validator
                .validate(schema_name, &payload)
                .map_err(|e| BlackboardError::SchemaViolation {
                    key: key.to_string(),
                    detail: e.to_string(),
                })?;
        }

        let mut versions = self
            .store
            .entry((run_id, key.to_string()))
            .or_default();
        let version = versions.len() as u64 + 1;
        versions.push(ArtifactVersion {
            version,
            produced_by: agent.to_string(),
            payload,
            written_at: Utc::now(),
        });
        drop(versions);

        counter!("blackboard_writes_total").increment(1);
        info!(run_id = %run_id, key = %key, agent = %agent, version, "Artifact written");
        self.events.publish(crate::domain::events::RunEvent::ArtifactWritten {
            run_id,
            key: key.to_string(),
            version,
            produced_by: agent.to_string(),
            at: Utc::now(),
        });
        Ok(version)
    }

    /// Latest version of `key`, readable by `agent`. `None` when the key has
    /// never been written in this run.
    pub fn read_latest(
        &self,
        run_id: RunId,
        key: &str,
        agent: &str,
    ) -> Result<Option<ArtifactVersion>, BlackboardError> {
        self.check_read(run_id, key, agent)?;
        Ok(self
            .store
            .get(&(run_id, key.to_string()))
            .and_then(|versions| versions.last().cloned()))
    }

    /// A specific historical version of `key`.
    pub fn read_version(
        &self,
        run_id: RunId,
        key: &str,
        agent: &str,
        version: u64,
    ) -> Result<Option<ArtifactVersion>, BlackboardError> {
        self.check_read(run_id, key, agent)?;
        if version == 0 {
            return Ok(None);
        }
        Ok(self
            .store
            .get(&(run_id, key.to_string()))
            .and_then(|versions| versions.get(version as usize - 1).cloned()))
    }

    /// Full version history of `key`, oldest first.
    pub fn history(
        &self,
        run_id: RunId,
        key: &str,
        agent: &str,
    ) -> Result<BlackboardEntry, BlackboardError> {
        self.check_read(run_id, key, agent)?;
        Ok(BlackboardEntry {
            run_id,
            key: key.to_string(),
            versions: self
                .store
                .get(&(run_id, key.to_string()))
                .map(|v| v.clone())
                .unwrap_or_default(),
        })
    }

    /// Every entry written during `run_id`, sorted by key. Bookkeeping only,
    /// no access control.
    pub fn list_entries(&self, run_id: RunId) -> Vec<BlackboardEntry> {
        let mut entries: Vec<BlackboardEntry> = self
            .store
            .iter()
            .filter(|item| item.key().0 == run_id)
            .map(|item| BlackboardEntry {
                run_id,
                key: item.key().1.clone(),
                versions: item.value().clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Drop all entries of a finished run.
    pub fn clear_run(&self, run_id: RunId) {
        self.store.retain(|(id, _), _| *id != run_id);
        debug!(run_id = %run_id, "Blackboard cleared for run");
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    fn check_read(&self, run_id: RunId, key: &str, agent: &str) -> Result<(), BlackboardError> {
        if !self.policy.is_known_key(key) {
            return Err(BlackboardError::UnknownKey(key.to_string()));
        }
        if !self.policy.may_read(key, agent) {
            warn!(
                run_id = %run_id,
                agent = %agent,
                key = %key,
                "Blackboard read denied: agent is not a consumer"
            );
            counter!("blackboard_access_denied_total").increment(1);
            return Err(BlackboardError::AccessDenied {
                agent: agent.to_string(),
                key: key.to_string(),
                operation: "read",
            });
        }
        Ok(())
    }
}
