// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0

// Schema Validation Interface (Anti-Corruption Layer)
//
// The blackboard service validates payloads against named schemas through
// this seam. The JSON Schema engine lives in
// infrastructure/schema_registry.rs.

use serde_json::Value;
use thiserror::Error;

/// Validates artifact payloads against named schemas.
pub trait SchemaValidator: Send + Sync {
    /// Check `payload` against the schema registered under `schema_name`.
    fn validate(&self, schema_name: &str, payload: &Value) -> Result<(), SchemaValidationError>;
}

#[derive(Debug, Error)]
pub enum SchemaValidationError {
    #[error("No schema registered under '{0}'")]
    UnknownSchema(String),

    #[error("Payload does not conform: {0}")]
    Invalid(String),
}

/// Accepts every payload. Used when a deployment opts out of validation and
/// in unit tests that exercise access control alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveValidator;

impl SchemaValidator for PermissiveValidator {
    fn validate(&self, _schema_name: &str, _payload: &Value) -> Result<(), SchemaValidationError> {
        Ok(())
    }
}
