// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Judge Verdict Domain Model
//!
//! Instead of binary pass/fail, artifacts are scored against a fixed weighted
//! rubric on a continuous `0.0 – 1.0` scale, allowing threshold-based gating
//! and confidence-weighted majority voting.
//!
//! ## Rubric (fixed weights)
//!
//! | Criterion | Weight |
//! |-----------|--------|
//! | correctness | 0.30 |
//! | security | 0.25 |
//! | maintainability | 0.20 |
//! | performance | 0.15 |
//! | test_coverage | 0.10 |
//!
//! ## Classification
//!
//! `score < 0.40 → veto`, `0.40 ≤ score < 0.65 → conditional_pass`,
//! `score ≥ 0.65 → pass`. Confidence is `max(0.3, 1 − 4·variance)` over the
//! per-criterion scores: tight agreement yields high confidence.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Rubric
// ============================================================================

/// The five fixed evaluation criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Correctness,
    Security,
    Maintainability,
    Performance,
    TestCoverage,
}

/// Rubric order is stable so prompts and aggregation iterate identically.
pub const RUBRIC: [Criterion; 5] = [
    Criterion::Correctness,
    Criterion::Security,
    Criterion::Maintainability,
    Criterion::Performance,
    Criterion::TestCoverage,
];

impl Criterion {
    pub fn weight(&self) -> f64 {
        match self {
            Criterion::Correctness => 0.30,
            Criterion::Security => 0.25,
            Criterion::Maintainability => 0.20,
            Criterion::Performance => 0.15,
            Criterion::TestCoverage => 0.10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Correctness => "correctness",
            Criterion::Security => "security",
            Criterion::Maintainability => "maintainability",
            Criterion::Performance => "performance",
            Criterion::TestCoverage => "test_coverage",
        }
    }
}

/// Qualitative level the LLM assigns per criterion, with its numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualitativeLevel {
    Excellent,
    Good,
    Acceptable,
    Failing,
}

impl QualitativeLevel {
    pub fn score(&self) -> f64 {
        match self {
            QualitativeLevel::Excellent => 1.0,
            QualitativeLevel::Good => 0.7,
            QualitativeLevel::Acceptable => 0.4,
            QualitativeLevel::Failing => 0.0,
        }
    }

    /// Lenient parse of model output; `None` for anything unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excellent" => Some(Self::Excellent),
            "good" => Some(Self::Good),
            "acceptable" => Some(Self::Acceptable),
            "failing" => Some(Self::Failing),
            _ => None,
        }
    }
}

/// One criterion's assessment within a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: Criterion,
    pub weight: f64,
    /// Numeric score in [0, 1].
    pub score: f64,
    /// Qualitative level, when the model produced a recognizable one.
    pub level: Option<QualitativeLevel>,
    /// Evidence text quoted by the evaluator.
    pub evidence: String,
}

// ============================================================================
// Verdict
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    ConditionalPass,
    Veto,
}

impl Verdict {
    /// Conservatism order used for vote tie-breaking: veto beats
    /// conditional_pass beats pass.
    pub fn conservatism(&self) -> u8 {
        match self {
            Verdict::Veto => 2,
            Verdict::ConditionalPass => 1,
            Verdict::Pass => 0,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "pass"),
            Verdict::ConditionalPass => write!(f, "conditional_pass"),
            Verdict::Veto => write!(f, "veto"),
        }
    }
}

/// Classify a weighted overall score. Boundary inclusivity: 0.40 is already a
/// conditional pass, 0.65 is already a pass.
pub fn classify(overall_score: f64) -> Verdict {
    if overall_score < 0.40 {
        Verdict::Veto
    } else if overall_score < 0.65 {
        Verdict::ConditionalPass
    } else {
        Verdict::Pass
    }
}

/// Confidence from per-criterion score spread: `max(0.3, 1 − 4·variance)`.
pub fn confidence_from_scores(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.3;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let variance =
        scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
    (1.0 - 4.0 * variance).max(0.3)
}

/// Aggregation detail attached when a verdict came from majority voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingMetadata {
    /// Voters that produced a usable verdict.
    pub voter_count: usize,
    pub individual_verdicts: Vec<Verdict>,
    /// Fraction of voters agreeing with the aggregated verdict.
    pub agreement_rate: f64,
}

/// Result of one quality arbitration call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// Checkpoint that triggered the evaluation.
    pub checkpoint: String,
    /// Blackboard key of the evaluated artifact.
    pub artifact_key: String,
    pub criteria: Vec<CriterionScore>,
    pub overall_score: f64,
    pub verdict: Verdict,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voting: Option<VotingMetadata>,
}

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Quorum not reached: {successful} of {required} voters produced a verdict")]
    QuorumNotReached { successful: usize, required: usize },

    #[error("Artifact '{key}' not found on blackboard for evaluation")]
    ArtifactMissing { key: String },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}
