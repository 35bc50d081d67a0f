// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod llm;
pub mod repositories;
pub mod schema_registry;

pub use event_bus::EventBus;
pub use repositories::{InMemoryRepositoryGraphStore, InMemoryRunRepository};
pub use schema_registry::SchemaRegistry;
