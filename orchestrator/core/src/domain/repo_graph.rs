// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Repository Dependency Graph
//!
//! Value objects for cross-repository scheduling: one node per repository,
//! holding its dependency edges and optional workspace layout metadata.
//! Repo URLs are normalized (scheme, `git@` form, `.git` suffix, trailing
//! slash, case) so the same repository never appears twice under different
//! spellings.

use serde::{Deserialize, Serialize};

/// Detected or declared multi-module layout of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceKind {
    CargoWorkspace,
    MavenMultiModule,
    PnpmWorkspace,
    GradleMultiProject,
    GoWorkspace,
}

/// Workspace metadata attached to a graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceLayout {
    pub kind: WorkspaceKind,
    /// Module/member paths relative to the repo root.
    pub modules: Vec<String>,
}

/// One repository in the cross-repo dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryGraphNode {
    /// Normalized repository URL (see [`normalize_repo_url`]).
    pub url: String,
    /// Normalized URLs of repositories this one depends on.
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceLayout>,
}

/// Canonical form of a repository URL: lowercase, no scheme, no `git@host:`
/// prefix form, no `.git` suffix, no trailing slash.
pub fn normalize_repo_url(raw: &str) -> String {
    let mut url = raw.trim().to_ascii_lowercase();
    for scheme in ["https://", "http://", "ssh://", "git://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            url = rest.to_string();
            break;
        }
    }
    // SSH shorthand: git@host:org/repo -> host/org/repo
    if let Some(rest) = url.strip_prefix("git@") {
        url = rest.replacen(':', "/", 1);
    }
    while url.ends_with('/') {
        url.pop();
    }
    if let Some(rest) = url.strip_suffix(".git") {
        url = rest.to_string();
    }
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Best-effort workspace detection from a repository's top-level file names.
/// `cargo_toml_has_workspace` disambiguates a plain crate from a workspace
/// root when `Cargo.toml` is present.
pub fn detect_workspace(files: &[&str], cargo_toml_has_workspace: bool) -> Option<WorkspaceKind> {
    if files.contains(&"pnpm-workspace.yaml") {
        return Some(WorkspaceKind::PnpmWorkspace);
    }
    if files.contains(&"go.work") {
        return Some(WorkspaceKind::GoWorkspace);
    }
    if files.contains(&"settings.gradle") || files.contains(&"settings.gradle.kts") {
        return Some(WorkspaceKind::GradleMultiProject);
    }
    if files.contains(&"pom.xml") {
        return Some(WorkspaceKind::MavenMultiModule);
    }
    if files.contains(&"Cargo.toml") && cargo_toml_has_workspace {
        return Some(WorkspaceKind::CargoWorkspace);
    }
    None
}
