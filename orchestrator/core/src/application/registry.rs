// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Registry & Discovery (Application Service)
//!
//! In-memory capability index over registered [`AgentCard`]s. Registration
//! replaces the whole record and rebuilds the per-capability index;
//! discovery scores active agents against a required capability set.
//!
//! The registry is an explicitly injected stateful service: callers receive
//! an `Arc<AgentRegistry>` at construction, never a process-wide singleton.
//! All maps are concurrent; register/discover race safely across in-flight
//! runs.

use dashmap::DashMap;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::domain::agent_card::{AgentCard, AgentHealth};
use crate::domain::role::AgentRole;

/// Capability-indexed registry of agent implementations.
pub struct AgentRegistry {
    /// Agent name -> card (whole-record replacement on re-register).
    cards: DashMap<String, AgentCard>,
    /// Capability -> set of agent names declaring it.
    capability_index: DashMap<String, BTreeSet<String>>,
}

/// One discovery hit: the card plus its match score, sorted descending.
#[derive(Debug, Clone)]
pub struct ScoredCard {
    pub card: AgentCard,
    pub score: f64,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            cards: DashMap::new(),
            capability_index: DashMap::new(),
        }
    }

    /// Register (or replace) a card and rebuild its index entries.
    pub fn register(&self, card: AgentCard) {
        let name = card.name.clone();
        // Drop stale index entries from a previous registration first.
        if let Some(old) = self.cards.get(&name).map(|c| c.capabilities.clone()) {
            self.remove_from_index(&name, &old);
        }
        for capability in &card.capabilities {
            self.capability_index
                .entry(capability.clone())
                .or_default()
                .insert(name.clone());
        }
        info!(agent = %name, role = %card.role, capabilities = card.capabilities.len(), "Agent registered");
        self.cards.insert(name, card);
    }

    /// Remove an agent from the registry and the capability index.
    pub fn deregister(&self, name: &str) {
        if let Some((_, card)) = self.cards.remove(name) {
            self.remove_from_index(name, &card.capabilities);
            info!(agent = %name, "Agent deregistered");
        }
    }

    pub fn get(&self, name: &str) -> Option<AgentCard> {
        self.cards.get(name).map(|c| c.clone())
    }

    /// All active agents scoring > 0 against `required`, best first. Ties
    /// keep insertion-independent stable order by name so results are
    /// deterministic.
    pub fn discover(&self, required: &[String]) -> Vec<ScoredCard> {
        let mut hits: Vec<ScoredCard> = self
            .cards
            .iter()
            .filter(|entry| entry.health == AgentHealth::Active)
            .filter_map(|entry| {
                let score = capability_score(&entry.capabilities, required);
                (score > 0.0).then(|| ScoredCard {
                    card: entry.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.card.name.cmp(&b.card.name))
        });
        hits
    }

    /// Best match for a role, falling back to the role's default agent name.
    /// `None` means the caller must use its local built-in implementation.
    pub fn discover_for_role(&self, role: AgentRole, required: &[String]) -> Option<AgentCard> {
        let best = self
            .discover(required)
            .into_iter()
            .find(|hit| hit.card.role == role);
        if let Some(hit) = best {
            debug!(agent = %hit.card.name, role = %role, score = hit.score, "Discovery matched agent");
            return Some(hit.card);
        }
        match self.get(role.default_agent()) {
            Some(card) if card.health == AgentHealth::Active => {
                debug!(agent = %card.name, role = %role, "Discovery fell back to default agent");
                Some(card)
            }
            _ => {
                debug!(role = %role, "No remote agent found; caller should use built-in step");
                None
            }
        }
    }

    /// Agent names declaring a capability (index lookup, not a scan).
    pub fn agents_with_capability(&self, capability: &str) -> Vec<String> {
        self.capability_index
            .get(capability)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn remove_from_index(&self, name: &str, capabilities: &[String]) {
        for capability in capabilities {
            if let Some(mut set) = self.capability_index.get_mut(capability) {
                set.remove(name);
            }
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Matched/required ratio; 1.0 when nothing is required (no bias without
/// data).
fn capability_score(declared: &[String], required: &[String]) -> f64 {
    if required.is_empty() {
        return 1.0;
    }
    let matched = required
        .iter()
        .filter(|r| declared.iter().any(|d| d == *r))
        .count();
    matched as f64 / required.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_score_is_matched_over_required() {
        assert_eq!(capability_score(&caps(&["a", "b"]), &caps(&["a", "b", "c", "d"])), 0.5);
        assert_eq!(capability_score(&caps(&["a"]), &caps(&["b"])), 0.0);
        assert_eq!(capability_score(&caps(&[]), &caps(&[])), 1.0);
    }

    #[test]
    fn test_discover_filters_zero_scores_and_inactive() {
        let registry = AgentRegistry::new();
        registry.register(AgentCard::new("match", AgentRole::Developer, caps(&["rust"])));
        registry.register(AgentCard::new("no-match", AgentRole::Developer, caps(&["go"])));
        registry.register(
            AgentCard::new("sick", AgentRole::Developer, caps(&["rust"]))
                .with_health(AgentHealth::Degraded),
        );

        let hits = registry.discover(&caps(&["rust"]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].card.name, "match");
    }

    #[test]
    fn test_discover_sorts_by_score_descending() {
        let registry = AgentRegistry::new();
        registry.register(AgentCard::new("partial", AgentRole::Developer, caps(&["rust"])));
        registry.register(AgentCard::new(
            "full",
            AgentRole::Developer,
            caps(&["rust", "testing"]),
        ));

        let hits = registry.discover(&caps(&["rust", "testing"]));
        assert_eq!(hits[0].card.name, "full");
        assert_eq!(hits[0].score, 1.0);
        assert_eq!(hits[1].card.name, "partial");
        assert_eq!(hits[1].score, 0.5);
    }

    #[test]
    fn test_register_replaces_and_reindexes() {
        let registry = AgentRegistry::new();
        registry.register(AgentCard::new("agent-x", AgentRole::Tester, caps(&["junit"])));
        registry.register(AgentCard::new("agent-x", AgentRole::Tester, caps(&["pytest"])));

        assert_eq!(registry.len(), 1);
        assert!(registry.agents_with_capability("junit").is_empty());
        assert_eq!(registry.agents_with_capability("pytest"), vec!["agent-x"]);
    }

    #[test]
    fn test_deregister_clears_index() {
        let registry = AgentRegistry::new();
        registry.register(AgentCard::new("gone", AgentRole::Pm, caps(&["planning"])));
        registry.deregister("gone");

        assert!(registry.is_empty());
        assert!(registry.agents_with_capability("planning").is_empty());
        assert!(registry.discover(&caps(&["planning"])).is_empty());
    }

    #[test]
    fn test_discover_for_role_prefers_role_match() {
        let registry = AgentRegistry::new();
        registry.register(AgentCard::new("dev", AgentRole::Developer, caps(&["rust"])));
        registry.register(AgentCard::new("tester", AgentRole::Tester, caps(&["rust"])));

        let card = registry.discover_for_role(AgentRole::Tester, &caps(&["rust"])).unwrap();
        assert_eq!(card.name, "tester");
    }

    #[test]
    fn test_discover_for_role_falls_back_to_default_agent() {
        let registry = AgentRegistry::new();
        registry.register(AgentCard::new("relay-writer", AgentRole::Writer, caps(&["docs"])));

        // Required capability nothing matches, but the default name exists.
        let card = registry
            .discover_for_role(AgentRole::Writer, &caps(&["interpretive-dance"]))
            .unwrap();
        assert_eq!(card.name, "relay-writer");
    }

    #[test]
    fn test_discover_for_role_none_means_builtin() {
        let registry = AgentRegistry::new();
        assert!(registry.discover_for_role(AgentRole::Pm, &caps(&["planning"])).is_none());
    }
}
