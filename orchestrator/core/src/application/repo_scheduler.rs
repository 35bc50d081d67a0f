// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Multi-Repository Scheduler
//!
//! Orders a set of repositories so every dependency is processed before its
//! dependents. The plan is a topological sort (Kahn's algorithm) over the
//! subgraph induced by the requested set: dependency edges pointing outside
//! the set are ignored, never fetched. A cycle inside the set is a hard
//! planning error naming the repositories involved.
//!
//! Ordering is deterministic: among ready repositories the lexicographically
//! smallest normalized URL goes first.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::repo_graph::{normalize_repo_url, RepositoryGraphNode};
use crate::domain::repository::{RepositoryError, RepositoryGraphStore};

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The induced subgraph contains at least one cycle; a valid order does
    /// not exist.
    #[error("Cyclic dependency among repositories: {0:?}")]
    CyclicDependency(Vec<String>),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Plans processing order over the persisted repository graph.
pub struct RepositoryScheduler {
    store: Arc<dyn RepositoryGraphStore>,
}

impl RepositoryScheduler {
    pub fn new(store: Arc<dyn RepositoryGraphStore>) -> Self {
        Self { store }
    }

    /// Register (or replace) a repository node. The node's URL and all its
    /// dependency edges are normalized before storage.
    pub async fn register_repository(
        &self,
        node: RepositoryGraphNode,
    ) -> Result<RepositoryGraphNode, SchedulerError> {
        let normalized = RepositoryGraphNode {
            url: normalize_repo_url(&node.url),
            depends_on: node
                .depends_on
                .iter()
                .map(|d| normalize_repo_url(d))
                .collect(),
            workspace: node.workspace,
        };
        self.store.save(&normalized).await?;
        info!(
            repo = %normalized.url,
            depends_on = normalized.depends_on.len(),
            "Repository registered in dependency graph"
        );
        Ok(normalized)
    }

    /// Order in which the repositories should be worked on: every dependency
    /// before its dependents. Unknown repositories are treated as isolated
    /// nodes with no edges.
    pub async fn execution_order(&self, repos: &[String]) -> Result<Vec<String>, SchedulerError> {
        self.plan(repos).await
    }

    /// Order in which finished changes should land: a dependency's change
    /// merges before anything depending on it, so dependents never merge
    /// against an unmerged dependency.
    pub async fn merge_order(&self, repos: &[String]) -> Result<Vec<String>, SchedulerError> {
        self.plan(repos).await
    }

    async fn plan(&self, repos: &[String]) -> Result<Vec<String>, SchedulerError> {
        // Induced subgraph: edges to repositories outside the set are
        // irrelevant to this plan.
        let requested: BTreeSet<String> =
            repos.iter().map(|r| normalize_repo_url(r)).collect();

        let mut in_degree: BTreeMap<&str, usize> =
            requested.iter().map(|r| (r.as_str(), 0)).collect();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        let mut edges: Vec<(String, String)> = Vec::new();
        for repo in &requested {
            if let Some(node) = self.store.find_by_url(repo).await? {
                for dep in &node.depends_on {
                    if requested.contains(dep) && dep != repo {
                        edges.push((dep.clone(), repo.clone()));
                    }
                }
            }
        }
        for (dep, repo) in &edges {
            if let Some(degree) = in_degree.get_mut(repo.as_str()) {
                *degree += 1;
            }
            let (Some(dep), Some(repo)) = (
                requested.get(dep.as_str()).map(String::as_str),
                requested.get(repo.as_str()).map(String::as_str),
            ) else {
                continue;
            };
            dependents.entry(dep).or_default().push(repo);
        }

        // BTreeSet keeps the ready frontier sorted, making the plan stable.
        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(r, _)| *r)
            .collect();
        let mut order = Vec::with_capacity(requested.len());
        while let Some(&repo) = ready.iter().next() {
            ready.remove(repo);
            order.push(repo.to_string());
            for dependent in dependents.get(repo).cloned().unwrap_or_default() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() < requested.len() {
            let stuck: Vec<String> = requested
                .iter()
                .filter(|r| !order.contains(r))
                .cloned()
                .collect();
            return Err(SchedulerError::CyclicDependency(stuck));
        }

        debug!(?order, "Repository plan computed");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryRepositoryGraphStore;

    fn node(url: &str, deps: &[&str]) -> RepositoryGraphNode {
        RepositoryGraphNode {
            url: url.to_string(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            workspace: None,
        }
    }

    async fn scheduler_with(nodes: Vec<RepositoryGraphNode>) -> RepositoryScheduler {
        let scheduler = RepositoryScheduler::new(Arc::new(InMemoryRepositoryGraphStore::new()));
        for n in nodes {
            scheduler.register_repository(n).await.unwrap();
        }
        scheduler
    }

    fn urls(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_dependencies_come_first() {
        let s = scheduler_with(vec![
            node("github.com/acme/app", &["github.com/acme/lib"]),
            node("github.com/acme/lib", &[]),
        ])
        .await;

        let plan = s
            .execution_order(&urls(&["github.com/acme/app", "github.com/acme/lib"]))
            .await
            .unwrap();
        assert_eq!(plan, vec!["github.com/acme/lib", "github.com/acme/app"]);
    }

    #[tokio::test]
    async fn test_plan_is_deterministic_for_independent_repos() {
        let s = scheduler_with(vec![]).await;
        let plan = s
            .execution_order(&urls(&["github.com/acme/b", "github.com/acme/a", "github.com/acme/c"]))
            .await
            .unwrap();
        assert_eq!(
            plan,
            vec!["github.com/acme/a", "github.com/acme/b", "github.com/acme/c"]
        );
    }

    #[tokio::test]
    async fn test_edges_outside_the_set_are_ignored() {
        let s = scheduler_with(vec![node(
            "github.com/acme/app",
            &["github.com/other/unrelated"],
        )])
        .await;

        let plan = s.execution_order(&urls(&["github.com/acme/app"])).await.unwrap();
        assert_eq!(plan, vec!["github.com/acme/app"]);
    }

    #[tokio::test]
    async fn test_cycle_is_a_planning_error() {
        let s = scheduler_with(vec![
            node("github.com/acme/a", &["github.com/acme/b"]),
            node("github.com/acme/b", &["github.com/acme/a"]),
        ])
        .await;

        let err = s
            .execution_order(&urls(&["github.com/acme/a", "github.com/acme/b"]))
            .await
            .unwrap_err();
        match err {
            SchedulerError::CyclicDependency(stuck) => {
                assert_eq!(stuck.len(), 2);
                assert!(stuck.contains(&"github.com/acme/a".to_string()));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_diamond_resolves() {
        // base <- left, right <- top
        let s = scheduler_with(vec![
            node("g.com/x/base", &[]),
            node("g.com/x/left", &["g.com/x/base"]),
            node("g.com/x/right", &["g.com/x/base"]),
            node("g.com/x/top", &["g.com/x/left", "g.com/x/right"]),
        ])
        .await;

        let plan = s
            .execution_order(&urls(&["g.com/x/top", "g.com/x/left", "g.com/x/right", "g.com/x/base"]))
            .await
            .unwrap();
        assert_eq!(plan[0], "g.com/x/base");
        assert_eq!(plan[3], "g.com/x/top");
    }

    #[tokio::test]
    async fn test_url_spellings_are_unified() {
        let s = scheduler_with(vec![node(
            "https://GitHub.com/Acme/App.git",
            &["git@github.com:acme/lib.git"],
        )])
        .await;

        let plan = s
            .execution_order(&urls(&["https://github.com/acme/app", "github.com/acme/lib/"]))
            .await
            .unwrap();
        assert_eq!(plan, vec!["github.com/acme/lib", "github.com/acme/app"]);
    }

    #[tokio::test]
    async fn test_merge_order_lands_dependencies_first() {
        let s = scheduler_with(vec![
            node("github.com/acme/app", &["github.com/acme/lib"]),
            node("github.com/acme/lib", &[]),
        ])
        .await;

        let order = s
            .merge_order(&urls(&["github.com/acme/app", "github.com/acme/lib"]))
            .await
            .unwrap();
        assert_eq!(order, vec!["github.com/acme/lib", "github.com/acme/app"]);
    }

    #[tokio::test]
    async fn test_unknown_repo_is_isolated_node() {
        let s = scheduler_with(vec![]).await;
        let plan = s.execution_order(&urls(&["github.com/acme/unseen"])).await.unwrap();
        assert_eq!(plan, vec!["github.com/acme/unseen"]);
    }
}
