// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # relay-orchestrator-core
//!
//! Core of the Relay multi-agent engineering orchestrator: a fixed
//! six-step pipeline (PM, QUALIFIER, ARCHITECT, DEVELOPER, TESTER, WRITER)
//! over a versioned, access-controlled blackboard, with signed capability
//! bindings, checkpoint grafts, tiered tool-call guardrails, LLM judge
//! gating and cross-repository scheduling.
//!
//! # Architecture
//!
//! - **domain** — aggregates, value objects and anti-corruption seams
//! - **application** — the services: registry, bindings, blackboard,
//!   guardrails, grafts, judge, scheduler and the workflow engine
//! - **infrastructure** — event bus, in-memory stores, JSON Schema
//!   registry and the HTTP LLM adapter

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
