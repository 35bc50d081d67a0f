// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0

// In-Memory Repository Implementations
//
// Concurrent-map implementations of the domain persistence traits. State is
// process-local and lost on restart; a durable backend would implement the
// same traits against a database.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::repo_graph::{normalize_repo_url, RepositoryGraphNode};
use crate::domain::repository::{
    RepositoryError, RepositoryGraphStore, RunRepository,
};
use crate::domain::run::{Run, RunId};

/// In-memory store for Run aggregates.
#[derive(Default)]
pub struct InMemoryRunRepository {
    runs: DashMap<RunId, Run>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn save(&self, run: &Run) -> Result<(), RepositoryError> {
        self.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: RunId) -> Result<Option<Run>, RepositoryError> {
        Ok(self.runs.get(&id).map(|r| r.clone()))
    }

    async fn find_active(&self) -> Result<Vec<Run>, RepositoryError> {
        Ok(self
            .runs
            .iter()
            .filter(|r| !r.state.is_terminal())
            .map(|r| r.clone())
            .collect())
    }

    async fn delete(&self, id: RunId) -> Result<(), RepositoryError> {
        self.runs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}

/// In-memory store for the repository dependency graph, keyed by normalized
/// URL.
#[derive(Default)]
pub struct InMemoryRepositoryGraphStore {
    nodes: DashMap<String, RepositoryGraphNode>,
}

impl InMemoryRepositoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepositoryGraphStore for InMemoryRepositoryGraphStore {
    async fn save(&self, node: &RepositoryGraphNode) -> Result<(), RepositoryError> {
        self.nodes
            .insert(normalize_repo_url(&node.url), node.clone());
        Ok(())
    }

    async fn find_by_url(
        &self,
        url: &str,
    ) -> Result<Option<RepositoryGraphNode>, RepositoryError> {
        Ok(self.nodes.get(&normalize_repo_url(url)).map(|n| n.clone()))
    }

    async fn list_all(&self) -> Result<Vec<RepositoryGraphNode>, RepositoryError> {
        Ok(self.nodes.iter().map(|n| n.clone()).collect())
    }
}
