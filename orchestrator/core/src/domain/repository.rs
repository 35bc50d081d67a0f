// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts, one per aggregate root: interface defined here,
//! implemented in `crate::infrastructure::repositories`. The core treats
//! stores as synchronous, always-consistent document access; durable
//! backends are an external concern behind these traits.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `RunRepository` | `Run` | `InMemoryRunRepository` |
//! | `RepositoryGraphStore` | `RepositoryGraphNode` | `InMemoryRepositoryGraphStore` |

use async_trait::async_trait;

use crate::domain::repo_graph::RepositoryGraphNode;
use crate::domain::run::{Run, RunId};

/// Repository interface for Run aggregates.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Save run (create or update).
    async fn save(&self, run: &Run) -> Result<(), RepositoryError>;

    /// Find run by ID.
    async fn find_by_id(&self, id: RunId) -> Result<Option<Run>, RepositoryError>;

    /// Find runs not yet in a terminal state.
    async fn find_active(&self) -> Result<Vec<Run>, RepositoryError>;

    /// Delete run by ID.
    async fn delete(&self, id: RunId) -> Result<(), RepositoryError>;
}

/// Store for the cross-repository dependency graph.
#[async_trait]
pub trait RepositoryGraphStore: Send + Sync {
    /// Save node (create or replace by normalized URL).
    async fn save(&self, node: &RepositoryGraphNode) -> Result<(), RepositoryError>;

    /// Find node by normalized URL.
    async fn find_by_url(&self, url: &str) -> Result<Option<RepositoryGraphNode>, RepositoryError>;

    /// List all known nodes.
    async fn list_all(&self) -> Result<Vec<RepositoryGraphNode>, RepositoryError>;
}

/// Repository errors.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
