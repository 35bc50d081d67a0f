// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0
//! # Judge Service
//!
//! Quality arbitration over checkpoint artifacts. Each evaluation scores the
//! artifact against the fixed rubric through the LLM seam, parses the reply
//! defensively (an unusable criterion falls back to a neutral 0.5, never an
//! error), and classifies the weighted score.
//!
//! With voting enabled, N independent evaluations run concurrently, each
//! voter with its own rubric emphasis and sampling temperature so the votes
//! are genuinely independent assessments. Votes are aggregated by summing
//! voter confidence per verdict category; ties resolve toward the most
//! conservative verdict. Fewer usable replies than the quorum is a
//! [`JudgeError::QuorumNotReached`].
//!
//! Conflict arbitration scores two competing positions' evidence against the
//! same rubric and returns a single resolving verdict.
//!
//! The judge reads artifacts with the orchestrator identity and writes its
//! verdicts under `judge_verdict` as `JUDGE`, the sole producer of that key.

use chrono::Utc;
use futures::future::join_all;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::blackboard_service::BlackboardService;
use crate::domain::blackboard::JUDGE_VERDICT_KEY;
use crate::domain::events::RunEvent;
use crate::domain::llm::{CompletionOptions, CompletionProvider};
use crate::domain::role::{JUDGE_IDENTITY, ORCHESTRATOR_IDENTITY};
use crate::domain::run::RunId;
use crate::domain::verdict::{
    classify, confidence_from_scores, CriterionScore, JudgeError, JudgeVerdict,
    QualitativeLevel, Verdict, VotingMetadata, RUBRIC,
};
use crate::infrastructure::event_bus::EventBus;

/// Voting policy. `voter_count == 1` disables aggregation entirely.
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub voter_count: usize,
    /// Minimum usable replies for an aggregated verdict.
    pub quorum: usize,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            voter_count: 3,
            quorum: 2,
        }
    }
}

/// One voter's slant: what it is told to weigh hardest and how much its
/// sampling may wander. Profiles cycle when `voter_count` exceeds them.
struct VoterProfile {
    emphasis: &'static str,
    temperature: f32,
}

const VOTER_PROFILES: [VoterProfile; 3] = [
    VoterProfile {
        emphasis: "Scrutinize correctness and security hardest.",
        temperature: 0.0,
    },
    VoterProfile {
        emphasis: "Scrutinize maintainability and test coverage hardest.",
        temperature: 0.3,
    },
    VoterProfile {
        emphasis: "Scrutinize performance and overall design coherence hardest.",
        temperature: 0.6,
    },
];

/// One side of a disputed assessment put before the judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictPosition {
    /// Identity advancing this position.
    pub agent: String,
    /// The claim in dispute.
    pub claim: String,
    /// Supporting evidence: artifact excerpts, measurements, test output.
    pub evidence: Value,
}

/// Resolution of a two-position conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationOutcome {
    /// Agent whose position prevailed.
    pub winner: String,
    pub winner_score: f64,
    pub loser_score: f64,
    /// The resolving verdict, classified from the winning position's score.
    pub verdict: JudgeVerdict,
}

/// LLM-backed artifact evaluator.
pub struct JudgeService {
    provider: Arc<dyn CompletionProvider>,
    blackboard: Arc<BlackboardService>,
    events: EventBus,
    config: JudgeConfig,
}

impl JudgeService {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        blackboard: Arc<BlackboardService>,
        events: EventBus,
        config: JudgeConfig,
    ) -> Self {
        Self {
            provider,
            blackboard,
            events,
            config,
        }
    }

    /// Evaluate the latest version of `artifact_key` at `checkpoint`,
    /// aggregate votes when configured, persist the verdict on the
    /// blackboard and publish it.
    pub async fn evaluate(
        &self,
        run_id: RunId,
        checkpoint: &str,
        artifact_key: &str,
    ) -> Result<JudgeVerdict, JudgeError> {
        let artifact = self
            .blackboard
            .read_latest(run_id, artifact_key, ORCHESTRATOR_IDENTITY)
            .map_err(|e| JudgeError::Evaluation(e.to_string()))?
            .ok_or_else(|| JudgeError::ArtifactMissing {
                key: artifact_key.to_string(),
            })?;

        let verdict = if self.config.voter_count > 1 {
            self.evaluate_with_voting(checkpoint, artifact_key, &artifact.payload)
                .await?
        } else {
            self.evaluate_once(checkpoint, artifact_key, &artifact.payload, None)
                .await?
        };

        info!(
            run_id = %run_id,
            checkpoint = %checkpoint,
            artifact = %artifact_key,
            verdict = %verdict.verdict,
            score = verdict.overall_score,
            confidence = verdict.confidence,
            "Judge verdict recorded"
        );
        self.record_verdict(run_id, checkpoint, &verdict)?;
        Ok(verdict)
    }

    /// Resolve a disagreement by scoring each position's evidence against
    /// the rubric. The higher weighted score wins; an exact tie goes to
    /// `first` (stable input order). The resolving verdict is persisted and
    /// published like any evaluation.
    pub async fn arbitrate(
        &self,
        run_id: RunId,
        checkpoint: &str,
        first: &ConflictPosition,
        second: &ConflictPosition,
    ) -> Result<ArbitrationOutcome, JudgeError> {
        let score_a = self.score_position(checkpoint, first).await?;
        let score_b = self.score_position(checkpoint, second).await?;

        let (winner, winning, losing) = if score_b.overall_score > score_a.overall_score {
            (second, score_b, score_a)
        } else {
            (first, score_a, score_b)
        };

        info!(
            run_id = %run_id,
            checkpoint = %checkpoint,
            winner = %winner.agent,
            winner_score = winning.overall_score,
            loser_score = losing.overall_score,
            "Conflict arbitrated"
        );
        self.record_verdict(run_id, checkpoint, &winning)?;
        Ok(ArbitrationOutcome {
            winner: winner.agent.clone(),
            winner_score: winning.overall_score,
            loser_score: losing.overall_score,
            verdict: winning,
        })
    }

    fn record_verdict(
        &self,
        run_id: RunId,
        checkpoint: &str,
        verdict: &JudgeVerdict,
    ) -> Result<(), JudgeError> {
        counter!("judge_evaluations_total").increment(1);
        let payload = serde_json::to_value(verdict)
            .map_err(|e| JudgeError::Evaluation(e.to_string()))?;
        self.blackboard
            .write(run_id, JUDGE_VERDICT_KEY, JUDGE_IDENTITY, payload)
            .map_err(|e| JudgeError::Evaluation(e.to_string()))?;
        self.events.publish(RunEvent::VerdictRecorded {
            run_id,
            checkpoint: checkpoint.to_string(),
            verdict: verdict.verdict,
            overall_score: verdict.overall_score,
            confidence: verdict.confidence,
            at: Utc::now(),
        });
        Ok(())
    }

    /// One independent rubric evaluation, optionally slanted by a voter
    /// profile.
    async fn evaluate_once(
        &self,
        checkpoint: &str,
        artifact_key: &str,
        payload: &Value,
        voter: Option<&VoterProfile>,
    ) -> Result<JudgeVerdict, JudgeError> {
        let options = CompletionOptions {
            temperature: Some(voter.map(|v| v.temperature).unwrap_or(0.0)),
            max_tokens: None,
        };
        let response = self
            .provider
            .complete_structured(
                &system_prompt(voter.map(|v| v.emphasis)),
                &user_prompt(artifact_key, payload),
                &verdict_schema(),
                &options,
            )
            .await
            .map_err(|e| JudgeError::Evaluation(e.to_string()))?;

        Ok(verdict_from_reply(checkpoint, artifact_key, &response))
    }

    /// Score one conflict position's evidence against the rubric.
    async fn score_position(
        &self,
        checkpoint: &str,
        position: &ConflictPosition,
    ) -> Result<JudgeVerdict, JudgeError> {
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: None,
        };
        let response = self
            .provider
            .complete_structured(
                &arbitration_prompt(),
                &position_prompt(position),
                &verdict_schema(),
                &options,
            )
            .await
            .map_err(|e| JudgeError::Evaluation(e.to_string()))?;

        Ok(verdict_from_reply(checkpoint, "arbitration", &response))
    }

    /// N concurrent evaluations aggregated by confidence-weighted vote.
    async fn evaluate_with_voting(
        &self,
        checkpoint: &str,
        artifact_key: &str,
        payload: &Value,
    ) -> Result<JudgeVerdict, JudgeError> {
        let votes = join_all((0..self.config.voter_count).map(|i| {
            let profile = &VOTER_PROFILES[i % VOTER_PROFILES.len()];
            self.evaluate_once(checkpoint, artifact_key, payload, Some(profile))
        }))
        .await;

        let usable: Vec<JudgeVerdict> = votes
            .into_iter()
            .filter_map(|v| match v {
                Ok(verdict) => Some(verdict),
                Err(e) => {
                    warn!(error = %e, "Judge voter failed");
                    None
                }
            })
            .collect();

        if usable.len() < self.config.quorum {
            return Err(JudgeError::QuorumNotReached {
                successful: usable.len(),
                required: self.config.quorum,
            });
        }

        let individual: Vec<Verdict> = usable.iter().map(|v| v.verdict).collect();
        let ballots: Vec<(Verdict, f64)> =
            usable.iter().map(|v| (v.verdict, v.confidence)).collect();
        let winner = weighted_verdict(&ballots);
        let agreement = individual.iter().filter(|v| **v == winner).count() as f64
            / individual.len() as f64;

        // Confidence-weighted mean of the voters' overall scores.
        let weight_sum: f64 = usable.iter().map(|v| v.confidence).sum();
        let overall_score = if weight_sum > 0.0 {
            usable
                .iter()
                .map(|v| v.overall_score * v.confidence)
                .sum::<f64>()
                / weight_sum
        } else {
            usable.iter().map(|v| v.overall_score).sum::<f64>() / usable.len() as f64
        };
        let confidence = (usable.iter().map(|v| v.confidence).sum::<f64>()
            / usable.len() as f64)
            * agreement;

        debug!(
            voters = usable.len(),
            ?individual,
            winner = %winner,
            agreement,
            "Aggregated judge votes"
        );

        Ok(JudgeVerdict {
            checkpoint: checkpoint.to_string(),
            artifact_key: artifact_key.to_string(),
            criteria: average_criteria(&usable),
            overall_score,
            verdict: winner,
            confidence,
            voting: Some(VotingMetadata {
                voter_count: usable.len(),
                individual_verdicts: individual,
                agreement_rate: agreement,
            }),
        })
    }
}

/// Verdict category with the largest summed voter confidence; a low-conviction
/// majority loses to a confident minority. Ties resolve toward the most
/// conservative option.
fn weighted_verdict(ballots: &[(Verdict, f64)]) -> Verdict {
    let mut best = Verdict::Pass;
    let mut best_weight = f64::NEG_INFINITY;
    for candidate in [Verdict::Pass, Verdict::ConditionalPass, Verdict::Veto] {
        let weight: f64 = ballots
            .iter()
            .filter(|(v, _)| *v == candidate)
            .map(|(_, confidence)| confidence)
            .sum();
        if weight > best_weight
            || (weight == best_weight && candidate.conservatism() > best.conservatism())
        {
            best = candidate;
            best_weight = weight;
        }
    }
    best
}

/// Per-criterion mean across voters, for the aggregated report.
fn average_criteria(verdicts: &[JudgeVerdict]) -> Vec<CriterionScore> {
    RUBRIC
        .iter()
        .map(|criterion| {
            let scores: Vec<&CriterionScore> = verdicts
                .iter()
                .filter_map(|v| v.criteria.iter().find(|c| c.criterion == *criterion))
                .collect();
            let mean = if scores.is_empty() {
                0.5
            } else {
                scores.iter().map(|c| c.score).sum::<f64>() / scores.len() as f64
            };
            CriterionScore {
                criterion: *criterion,
                weight: criterion.weight(),
                score: mean,
                level: None,
                evidence: scores
                    .first()
                    .map(|c| c.evidence.clone())
                    .unwrap_or_default(),
            }
        })
        .collect()
}

fn verdict_from_reply(checkpoint: &str, artifact_key: &str, response: &str) -> JudgeVerdict {
    let criteria = parse_criteria(response);
    let overall_score: f64 = criteria.iter().map(|c| c.weight * c.score).sum();
    let scores: Vec<f64> = criteria.iter().map(|c| c.score).collect();
    JudgeVerdict {
        checkpoint: checkpoint.to_string(),
        artifact_key: artifact_key.to_string(),
        criteria,
        overall_score,
        verdict: classify(overall_score),
        confidence: confidence_from_scores(&scores),
        voting: None,
    }
}

/// Defensive parse of one structured reply. Every unusable criterion falls
/// back to a neutral 0.5 so a sloppy reply degrades the score, not the run.
fn parse_criteria(response: &str) -> Vec<CriterionScore> {
    let parsed: Value = serde_json::from_str(response).unwrap_or(Value::Null);
    RUBRIC
        .iter()
        .map(|criterion| {
            let entry = parsed.get(criterion.as_str());
            let level = entry
                .and_then(|e| e.get("level"))
                .and_then(Value::as_str)
                .and_then(QualitativeLevel::parse);
            let score = match (level, entry.and_then(|e| e.get("score")).and_then(Value::as_f64)) {
                (Some(level), _) => level.score(),
                (None, Some(numeric)) => numeric.clamp(0.0, 1.0),
                (None, None) => 0.5,
            };
            let evidence = entry
                .and_then(|e| e.get("evidence"))
                .and_then(Value::as_str)
                .unwrap_or("no usable assessment returned")
                .to_string();
            CriterionScore {
                criterion: *criterion,
                weight: criterion.weight(),
                score,
                level,
                evidence,
            }
        })
        .collect()
}

fn system_prompt(emphasis: Option<&str>) -> String {
    let rubric_lines: Vec<String> = RUBRIC
        .iter()
        .map(|c| format!("- {} (weight {:.2})", c.as_str(), c.weight()))
        .collect();
    let mut prompt = format!(
        "You are a strict software quality judge. Assess the artifact against \
         each criterion and reply with JSON only.\n\nCriteria:\n{}\n\n\
         For each criterion give a level (excellent, good, acceptable, failing) \
         and one sentence of evidence quoting the artifact.",
        rubric_lines.join("\n")
    );
    if let Some(emphasis) = emphasis {
        prompt.push('\n');
        prompt.push_str(emphasis);
    }
    prompt
}

fn arbitration_prompt() -> String {
    format!(
        "{}\nYou are arbitrating a disagreement: judge only the position \
         presented, on the strength of its evidence.",
        system_prompt(None)
    )
}

fn user_prompt(artifact_key: &str, payload: &Value) -> String {
    format!(
        "Artifact '{artifact_key}':\n```json\n{}\n```",
        serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
    )
}

fn position_prompt(position: &ConflictPosition) -> String {
    format!(
        "Position held by '{}': {}\nEvidence:\n```json\n{}\n```",
        position.agent,
        position.claim,
        serde_json::to_string_pretty(&position.evidence)
            .unwrap_or_else(|_| position.evidence.to_string())
    )
}

fn verdict_schema() -> Value {
    let criterion_schema = json!({
        "type": "object",
        "properties": {
            "level": {"type": "string", "enum": ["excellent", "good", "acceptable", "failing"]},
            "evidence": {"type": "string"}
        },
        "required": ["level", "evidence"]
    });
    let mut properties = serde_json::Map::new();
    for criterion in RUBRIC {
        properties.insert(criterion.as_str().to_string(), criterion_schema.clone());
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": RUBRIC.iter().map(|c| c.as_str()).collect::<Vec<_>>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blackboard::AccessPolicy;
    use crate::domain::llm::CompletionError;
    use crate::domain::schema::PermissiveValidator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns canned replies in order, cycling on exhaustion.
    struct CannedProvider {
        replies: Vec<Result<String, ()>>,
        calls: AtomicUsize,
    }

    impl CannedProvider {
        fn new(replies: Vec<Result<String, ()>>) -> Self {
            Self {
                replies,
                calls: AtomicUsize::new(0),
            }
        }

        fn uniform(reply: &str, n: usize) -> Self {
            Self::new(vec![Ok(reply.to_string()); n])
        }
    }

    #[async_trait]
    impl CompletionProvider for CannedProvider {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            unimplemented!("judge only uses structured completion")
        }

        async fn complete_structured(
            &self,
            _system: &str,
            _user: &str,
            _schema: &Value,
            _options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst) % self.replies.len();
            self.replies[i]
                .clone()
                .map_err(|_| CompletionError::Request("canned failure".to_string()))
        }
    }

    /// Records the system prompt and sampling options of every call.
    struct RecordingProvider {
        reply: String,
        seen: Mutex<Vec<(String, Option<f32>)>>,
    }

    #[async_trait]
    impl CompletionProvider for RecordingProvider {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            unimplemented!()
        }

        async fn complete_structured(
            &self,
            system: &str,
            _user: &str,
            _schema: &Value,
            options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), options.temperature));
            Ok(self.reply.clone())
        }
    }

    fn reply(level: &str) -> String {
        let mut obj = serde_json::Map::new();
        for criterion in RUBRIC {
            obj.insert(
                criterion.as_str().to_string(),
                json!({"level": level, "evidence": "looks fine"}),
            );
        }
        Value::Object(obj).to_string()
    }

    /// A passing reply with maximal criterion spread, so its confidence
    /// bottoms out at the 0.3 floor: three excellent criteria carry the
    /// weighted score to 0.75 while two failing ones blow up the variance.
    fn low_confidence_pass_reply() -> String {
        json!({
            "correctness": {"level": "excellent", "evidence": "ok"},
            "security": {"level": "excellent", "evidence": "ok"},
            "maintainability": {"level": "excellent", "evidence": "ok"},
            "performance": {"level": "failing", "evidence": "slow"},
            "test_coverage": {"level": "failing", "evidence": "none"},
        })
        .to_string()
    }

    fn judge_with(provider: impl CompletionProvider + 'static, config: JudgeConfig) -> (JudgeService, Arc<BlackboardService>, RunId) {
        let blackboard = Arc::new(BlackboardService::new(
            AccessPolicy::pipeline_default(),
            Arc::new(PermissiveValidator),
            EventBus::with_default_capacity(),
        ));
        let run_id = RunId::new();
        blackboard
            .write(run_id, "implementation_diff", "DEVELOPER", json!({"diff": "+fn main() {}"}))
            .unwrap();
        let judge = JudgeService::new(
            Arc::new(provider),
            blackboard.clone(),
            EventBus::with_default_capacity(),
            config,
        );
        (judge, blackboard, run_id)
    }

    #[tokio::test]
    async fn test_good_artifact_passes() {
        let (judge, blackboard, run_id) = judge_with(
            CannedProvider::uniform(&reply("good"), 3),
            JudgeConfig::default(),
        );
        let verdict = judge
            .evaluate(run_id, "after_developer", "implementation_diff")
            .await
            .unwrap();

        // All criteria at 0.7 -> weighted 0.7 -> pass.
        assert_eq!(verdict.verdict, Verdict::Pass);
        assert!((verdict.overall_score - 0.7).abs() < 1e-9);
        assert_eq!(verdict.voting.as_ref().unwrap().voter_count, 3);
        assert!((verdict.voting.as_ref().unwrap().agreement_rate - 1.0).abs() < 1e-9);

        // Verdict written back under the reserved key.
        let stored = blackboard
            .read_latest(run_id, JUDGE_VERDICT_KEY, ORCHESTRATOR_IDENTITY)
            .unwrap()
            .unwrap();
        assert_eq!(stored.produced_by, JUDGE_IDENTITY);
    }

    #[tokio::test]
    async fn test_failing_artifact_is_vetoed() {
        let (judge, _, run_id) = judge_with(
            CannedProvider::uniform(&reply("failing"), 3),
            JudgeConfig::default(),
        );
        let verdict = judge
            .evaluate(run_id, "after_developer", "implementation_diff")
            .await
            .unwrap();
        assert_eq!(verdict.verdict, Verdict::Veto);
        assert_eq!(verdict.overall_score, 0.0);
    }

    #[tokio::test]
    async fn test_majority_wins() {
        let (judge, _, run_id) = judge_with(
            CannedProvider::new(vec![
                Ok(reply("good")),
                Ok(reply("good")),
                Ok(reply("failing")),
            ]),
            JudgeConfig::default(),
        );
        let verdict = judge
            .evaluate(run_id, "after_developer", "implementation_diff")
            .await
            .unwrap();
        assert_eq!(verdict.verdict, Verdict::Pass);
        let voting = verdict.voting.unwrap();
        assert!((voting.agreement_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_confident_veto_outweighs_hesitant_passes() {
        // Two pass votes at the 0.3 confidence floor (0.6 summed) lose to
        // one unanimous-criteria veto at confidence 1.0.
        let (judge, _, run_id) = judge_with(
            CannedProvider::new(vec![
                Ok(low_confidence_pass_reply()),
                Ok(low_confidence_pass_reply()),
                Ok(reply("failing")),
            ]),
            JudgeConfig::default(),
        );
        let verdict = judge
            .evaluate(run_id, "after_developer", "implementation_diff")
            .await
            .unwrap();
        assert_eq!(verdict.verdict, Verdict::Veto);
        assert!((verdict.voting.unwrap().agreement_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_quorum_failure_is_an_error() {
        let (judge, _, run_id) = judge_with(
            CannedProvider::new(vec![Ok(reply("good")), Err(()), Err(())]),
            JudgeConfig::default(),
        );
        let err = judge
            .evaluate(run_id, "after_developer", "implementation_diff")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JudgeError::QuorumNotReached { successful: 1, required: 2 }
        ));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_an_error() {
        let (judge, _, run_id) = judge_with(
            CannedProvider::uniform(&reply("good"), 3),
            JudgeConfig::default(),
        );
        let err = judge
            .evaluate(run_id, "after_tester", "test_report")
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::ArtifactMissing { .. }));
    }

    #[tokio::test]
    async fn test_single_voter_skips_aggregation() {
        let (judge, _, run_id) = judge_with(
            CannedProvider::uniform(&reply("excellent"), 1),
            JudgeConfig { voter_count: 1, quorum: 1 },
        );
        let verdict = judge
            .evaluate(run_id, "after_developer", "implementation_diff")
            .await
            .unwrap();
        assert_eq!(verdict.verdict, Verdict::Pass);
        assert!(verdict.voting.is_none());
    }

    #[tokio::test]
    async fn test_voters_diverge_in_emphasis_and_temperature() {
        let provider = Arc::new(RecordingProvider {
            reply: reply("good"),
            seen: Mutex::new(Vec::new()),
        });
        let blackboard = Arc::new(BlackboardService::new(
            AccessPolicy::pipeline_default(),
            Arc::new(PermissiveValidator),
            EventBus::with_default_capacity(),
        ));
        let run_id = RunId::new();
        blackboard
            .write(run_id, "implementation_diff", "DEVELOPER", json!({"diff": "+x"}))
            .unwrap();
        let judge = JudgeService::new(
            provider.clone(),
            blackboard,
            EventBus::with_default_capacity(),
            JudgeConfig::default(),
        );
        judge
            .evaluate(run_id, "after_developer", "implementation_diff")
            .await
            .unwrap();

        // Three voters, three distinct prompts, three distinct temperatures.
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        let prompts: std::collections::BTreeSet<&String> =
            seen.iter().map(|(p, _)| p).collect();
        assert_eq!(prompts.len(), 3);
        let mut temps: Vec<f32> = seen.iter().filter_map(|(_, t)| *t).collect();
        temps.sort_by(|a, b| a.total_cmp(b));
        temps.dedup();
        assert_eq!(temps.len(), 3);
    }

    #[tokio::test]
    async fn test_arbitration_prefers_the_stronger_evidence() {
        // First structured call scores the first position, second the other.
        let (judge, blackboard, run_id) = judge_with(
            CannedProvider::new(vec![Ok(reply("failing")), Ok(reply("excellent"))]),
            JudgeConfig::default(),
        );
        let weak = ConflictPosition {
            agent: "DEVELOPER".to_string(),
            claim: "the retry loop is sufficient".to_string(),
            evidence: json!({"diff": "+retry(1)"}),
        };
        let strong = ConflictPosition {
            agent: "TESTER".to_string(),
            claim: "the retry loop drops the final error".to_string(),
            evidence: json!({"failed_test": "upload_gives_up_silently"}),
        };

        let outcome = judge
            .arbitrate(run_id, "after_tester", &weak, &strong)
            .await
            .unwrap();

        assert_eq!(outcome.winner, "TESTER");
        assert!(outcome.winner_score > outcome.loser_score);
        assert_eq!(outcome.verdict.verdict, Verdict::Pass);
        // The resolving verdict lands on the blackboard like any other.
        let stored = blackboard
            .read_latest(run_id, JUDGE_VERDICT_KEY, ORCHESTRATOR_IDENTITY)
            .unwrap()
            .unwrap();
        assert_eq!(stored.produced_by, JUDGE_IDENTITY);
        assert_eq!(stored.payload["artifact_key"], "arbitration");
    }

    #[tokio::test]
    async fn test_arbitration_tie_goes_to_the_first_position() {
        let (judge, _, run_id) = judge_with(
            CannedProvider::uniform(&reply("good"), 2),
            JudgeConfig::default(),
        );
        let a = ConflictPosition {
            agent: "ARCHITECT".to_string(),
            claim: "keep the module split".to_string(),
            evidence: json!({}),
        };
        let b = ConflictPosition {
            agent: "DEVELOPER".to_string(),
            claim: "merge the modules".to_string(),
            evidence: json!({}),
        };
        let outcome = judge.arbitrate(run_id, "after_architect", &a, &b).await.unwrap();
        assert_eq!(outcome.winner, "ARCHITECT");
    }

    #[tokio::test]
    async fn test_garbage_reply_degrades_to_neutral() {
        let (judge, _, run_id) = judge_with(
            CannedProvider::uniform("certainly! here is my assessment:", 3),
            JudgeConfig::default(),
        );
        let verdict = judge
            .evaluate(run_id, "after_developer", "implementation_diff")
            .await
            .unwrap();
        // Every criterion at 0.5 -> 0.5 weighted -> conditional pass.
        assert_eq!(verdict.verdict, Verdict::ConditionalPass);
        assert!((verdict.overall_score - 0.5).abs() < 1e-9);
        assert!(verdict.criteria.iter().all(|c| c.level.is_none()));
    }

    #[test]
    fn test_weighted_votes_favor_conviction_over_headcount() {
        assert_eq!(
            weighted_verdict(&[
                (Verdict::Pass, 0.3),
                (Verdict::Pass, 0.3),
                (Verdict::Veto, 1.0),
            ]),
            Verdict::Veto
        );
        assert_eq!(
            weighted_verdict(&[
                (Verdict::Pass, 0.9),
                (Verdict::Pass, 0.9),
                (Verdict::Veto, 1.0),
            ]),
            Verdict::Pass
        );
    }

    #[test]
    fn test_tie_breaks_conservatively() {
        assert_eq!(
            weighted_verdict(&[(Verdict::Pass, 1.0), (Verdict::Veto, 1.0)]),
            Verdict::Veto
        );
        assert_eq!(
            weighted_verdict(&[(Verdict::Pass, 0.5), (Verdict::ConditionalPass, 0.5)]),
            Verdict::ConditionalPass
        );
        assert_eq!(
            weighted_verdict(&[
                (Verdict::Pass, 1.0),
                (Verdict::Pass, 1.0),
                (Verdict::Veto, 1.0),
            ]),
            Verdict::Pass
        );
    }

    #[test]
    fn test_parse_accepts_numeric_scores() {
        let reply = json!({
            "correctness": {"score": 0.9, "evidence": "solid"},
            "security": {"level": "good", "evidence": "ok"},
        })
        .to_string();
        let criteria = parse_criteria(&reply);
        assert_eq!(criteria[0].score, 0.9);
        assert_eq!(criteria[1].score, 0.7);
        // Unmentioned criteria fall back to neutral.
        assert_eq!(criteria[2].score, 0.5);
    }

    #[test]
    fn test_parse_clamps_out_of_range_scores() {
        let reply = json!({"correctness": {"score": 7.5, "evidence": "?"}}).to_string();
        let criteria = parse_criteria(&reply);
        assert_eq!(criteria[0].score, 1.0);
    }
}
