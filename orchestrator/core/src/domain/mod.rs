// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Pure types and contracts: aggregates, value objects, domain errors and
//! the anti-corruption seams (persistence, LLM, agent transport, schema
//! validation). No I/O happens in this layer.

pub mod agent_card;
pub mod binding;
pub mod blackboard;
pub mod events;
pub mod graft;
pub mod interrupt;
pub mod invoker;
pub mod llm;
pub mod repo_graph;
pub mod repository;
pub mod role;
pub mod run;
pub mod schema;
pub mod verdict;
