// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0

// Agent Invocation Interface (Anti-Corruption Layer)
//
// The workflow engine and the graft engine both execute agents through this
// seam. Implementations route to remote transports (per the card) or to the
// local built-in step when no card is supplied. SCM/LLM access happens behind
// the agent implementations, never in the core.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::agent_card::AgentCard;
use crate::domain::role::AgentRole;
use crate::domain::run::{Run, RunContext, StepOutcome};

/// Executes one agent on behalf of a run.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Execute a pipeline step. `card` is `Some` when the registry resolved a
    /// remote implementation; `None` means "use the local built-in".
    async fn invoke_step(
        &self,
        run: &Run,
        role: AgentRole,
        card: Option<&AgentCard>,
        context: &mut RunContext,
    ) -> Result<StepOutcome, InvokeError>;

    /// Execute a graft agent and return its output artifact payload.
    async fn invoke_graft(
        &self,
        run: &Run,
        agent_name: &str,
        checkpoint: &str,
    ) -> Result<Value, InvokeError>;
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Agent '{agent}' execution failed: {detail}")]
    Execution { agent: String, detail: String },

    #[error("Agent '{agent}' transport '{transport}' is not supported")]
    UnsupportedTransport { agent: String, transport: String },
}
