// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0

// LLM Completion Interface (Anti-Corruption Layer)
//
// Domain-side contract for the language-model collaborator. The judge is the
// only core consumer; it treats the model as a possibly-slow,
// possibly-malformed-output black box and parses every response defensively.
// Implementations live in infrastructure/llm.rs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Contract for text-completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a free-form completion.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;

    /// Generate a completion expected to conform to `json_schema`. The
    /// provider may enforce the schema server-side or merely hint it; callers
    /// must still validate the result. `options` lets callers vary sampling
    /// per call (the judge's voters deliberately diverge here).
    async fn complete_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        json_schema: &serde_json::Value,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;
}

/// Options for completion generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Sampling temperature (0.0 = deterministic).
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")]
    Request(String),

    #[error("Completion timed out after {0} seconds")]
    Timeout(u64),

    #[error("Provider returned status {status}: {detail}")]
    Provider { status: u16, detail: String },
}
