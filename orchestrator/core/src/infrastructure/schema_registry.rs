// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0

// Schema Registry - JSON Schema validation for blackboard artifacts
//
// Compiles the embedded artifact schemas once at startup and serves
// validations through the domain's SchemaValidator seam. Schemas are
// intentionally permissive about extra fields: they pin down the shape
// agents must produce, not everything they may add.

use jsonschema::Validator;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::domain::schema::{SchemaValidationError, SchemaValidator};

/// Registry of compiled artifact schemas, keyed by schema name.
pub struct SchemaRegistry {
    validators: HashMap<String, Validator>,
}

impl SchemaRegistry {
    /// Compile the built-in schema set. Fails only on a malformed embedded
    /// schema, which the constructor test pins down.
    pub fn with_builtin_schemas() -> Result<Self, SchemaValidationError> {
        let mut registry = Self {
            validators: HashMap::new(),
        };
        for (name, schema) in builtin_schemas() {
            registry.register(name, &schema)?;
        }
        Ok(registry)
    }

    /// Compile and register (or replace) one schema.
    pub fn register(&mut self, name: &str, schema: &Value) -> Result<(), SchemaValidationError> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| SchemaValidationError::Invalid(e.to_string()))?;
        self.validators.insert(name.to_string(), validator);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }
}

impl SchemaValidator for SchemaRegistry {
    fn validate(&self, schema_name: &str, payload: &Value) -> Result<(), SchemaValidationError> {
        let validator = self
            .validators
            .get(schema_name)
            .ok_or_else(|| SchemaValidationError::UnknownSchema(schema_name.to_string()))?;
        let errors: Vec<String> = validator
            .iter_errors(payload)
            .map(|e| format!("{}: {}", e.instance_path(), e))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError::Invalid(errors.join("; ")))
        }
    }
}

fn builtin_schemas() -> Vec<(&'static str, Value)> {
    vec![
        (
            "ticket_plan",
            json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string", "minLength": 1},
                    "acceptance_criteria": {
                        "type": "array",
                        "items": {"type": "string"}
                    }
                },
                "required": ["summary"]
            }),
        ),
        (
            "qualification_report",
            json!({
                "type": "object",
                "properties": {
                    "feasible": {"type": "boolean"},
                    "notes": {"type": "string"}
                },
                "required": ["feasible"]
            }),
        ),
        (
            "architecture_notes",
            json!({
                "type": "object",
                "properties": {
                    "approach": {"type": "string", "minLength": 1},
                    "affected_files": {
                        "type": "array",
                        "items": {"type": "string"}
                    }
                },
                "required": ["approach"]
            }),
        ),
        (
            "implementation_diff",
            json!({
                "type": "object",
                "properties": {
                    "diff": {"type": "string"},
                    "files_changed": {"type": "integer", "minimum": 0}
                },
                "required": ["diff"]
            }),
        ),
        (
            "test_report",
            json!({
                "type": "object",
                "properties": {
                    "passed": {"type": "integer", "minimum": 0},
                    "failed": {"type": "integer", "minimum": 0},
                    "log": {"type": "string"}
                },
                "required": ["passed", "failed"]
            }),
        ),
        (
            "documentation",
            json!({
                "type": "object",
                "properties": {
                    "changelog": {"type": "string"},
                    "docs": {"type": "string"}
                },
                "required": ["changelog"]
            }),
        ),
        (
            "escalation",
            json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "minLength": 1}
                },
                "required": ["reason"]
            }),
        ),
        (
            "judge_verdict",
            json!({
                "type": "object",
                "properties": {
                    "verdict": {
                        "type": "string",
                        "enum": ["pass", "conditional_pass", "veto"]
                    },
                    "overall_score": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0}
                },
                "required": ["verdict", "overall_score"]
            }),
        ),
    ]
}
