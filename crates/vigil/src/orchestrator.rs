// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::affective::{AffectiveState, AffectiveTracker, FeatureVector, SituationalContext};
use crate::config::GovernanceConfig;
use crate::critics::{CriticContext, KnowledgeMatch, MasterCritic, MasterCriticResult};
use crate::logging::{tracing_sink, GovernanceEvent, SharedSink};
use crate::policy::{ModelChecker, PolicyRegistry, VerificationResult};
use crate::trace::TraceBuilder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info};
use uuid::Uuid;
use vigil_contracts::{
    ConversationMessage, GovernanceResult, MessageMetadata, MessageRole, ResponseSource, Severity,
    Verdict,
};

/// Response proposed by the generator, before governance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub text: String,
    pub source: ResponseSource,
    #[serde(default)]
    pub kb_match: Option<KnowledgeMatch>,
    /// Caller-supplied values; these win over anything the pipeline computes.
    #[serde(default)]
    pub metadata: MessageMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub conversation_id: String,
    #[serde(default)]
    pub previous_state: AffectiveState,
    #[serde(default)]
    pub features: FeatureVector,
    #[serde(default)]
    pub situational: SituationalContext,
    /// Messages exchanged so far, oldest first, excluding the candidate.
    #[serde(default)]
    pub history: Vec<ConversationMessage>,
    pub candidate: CandidateResponse,
    #[serde(default)]
    pub persuasion_limit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffectiveSnapshot {
    pub timestep: u64,
    pub emotional: f64,
    pub persuasion: f64,
    pub intensity: f64,
    pub ethical_override: bool,
}

impl From<&AffectiveState> for AffectiveSnapshot {
    fn from(state: &AffectiveState) -> Self {
        Self {
            timestep: state.timestep,
            emotional: state.emotional,
            persuasion: state.persuasion,
            intensity: state.intensity,
            ethical_override: state.ethical_override,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyViolation {
    pub policy_id: String,
    pub severity: Severity,
    pub state_index: usize,
    pub clause: String,
    pub reason: String,
}

impl PolicyViolation {
    fn from_result(result: &VerificationResult) -> Option<Self> {
        let counterexample = result.counterexample.as_ref()?;
        Some(Self {
            policy_id: result.policy_id.clone(),
            severity: result.severity,
            state_index: counterexample.state_index,
            clause: counterexample.clause.clone(),
            reason: counterexample.reason.clone(),
        })
    }
}

/// Outcome of one governance pass. Always produced, even on internal failure.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub decision_id: Uuid,
    pub conversation_id: String,
    pub decided_at: DateTime<Utc>,
    pub verdict: Verdict,
    pub affective: Option<AffectiveSnapshot>,
    /// State to feed into the next decision of this conversation.
    pub next_state: Option<AffectiveState>,
    pub critics: Option<MasterCriticResult>,
    pub violations: Vec<PolicyViolation>,
    pub safe_trace: bool,
    /// Set when the pipeline failed and the verdict is the fail-safe escalation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Policy results for a history, without a candidate response.
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    pub states: usize,
    pub safe: bool,
    pub results: Vec<VerificationResult>,
}

pub struct DecisionOrchestrator {
    tracker: AffectiveTracker,
    critics: MasterCritic,
    builder: TraceBuilder,
    checker: ModelChecker,
    registry: PolicyRegistry,
    revision_confidence: f64,
    sink: SharedSink,
}

impl DecisionOrchestrator {
    pub fn new(config: &GovernanceConfig, registry: PolicyRegistry, sink: SharedSink) -> Self {
        Self {
            tracker: AffectiveTracker::new(config.affective.clone(), sink.clone()),
            critics: MasterCritic::new(&config.critics),
            builder: TraceBuilder::new(config.limits.max_trace_states),
            checker: ModelChecker::new(sink.clone())
                .with_counterexample_mode(config.checker.counterexample_mode)
                .with_max_formula_depth(config.checker.max_formula_depth),
            registry,
            revision_confidence: config.critics.revision_confidence,
            sink,
        }
    }

    /// Default policy library and a `tracing` event sink.
    pub fn with_defaults(config: &GovernanceConfig) -> GovernanceResult<Self> {
        let registry = PolicyRegistry::with_defaults(config.checker.max_formula_depth)?;
        Ok(Self::new(config, registry, tracing_sink()))
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Runs the full pipeline. Any error or panic inside it yields an
    /// `Escalate` decision carrying the failure reason.
    pub fn decide(&self, request: &DecisionRequest) -> Decision {
        match catch_unwind(AssertUnwindSafe(|| self.evaluate(request))) {
            Ok(Ok(decision)) => decision,
            Ok(Err(err)) => self.fail_safe(request, err.to_string()),
            Err(panic) => self.fail_safe(request, panic_reason(panic.as_ref())),
        }
    }

    pub fn verify_history(&self, history: &[ConversationMessage]) -> GovernanceResult<TraceReport> {
        let trace = self.builder.build(history)?;
        let results = self.checker.verify_all(&trace, &self.registry);
        Ok(TraceReport {
            states: trace.len(),
            safe: self.checker.is_safe_trace(&trace, &self.registry),
            results,
        })
    }

    fn evaluate(&self, request: &DecisionRequest) -> GovernanceResult<Decision> {
        let next_state = self.tracker.update(
            &request.previous_state,
            &request.features,
            &request.situational,
        )?;

        let candidate = &request.candidate;
        let inbound = request
            .history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Customer)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let cart_value = request.situational.cart_value;
        let critic_context = CriticContext {
            message: inbound,
            response: candidate.text.clone(),
            source: candidate.source,
            cart_value: (cart_value > 0.0).then_some(cart_value),
            kb_match: candidate.kb_match.clone(),
            persuasion_level: Some(next_state.persuasion),
            persuasion_limit: request.persuasion_limit,
        };
        let critics = self.critics.evaluate(&critic_context);

        let computed = MessageMetadata {
            cart_value: Some(cart_value),
            sentiment: Some(next_state.emotional),
            persuasion_level: Some(next_state.persuasion),
            risk_score: critics.risk.score,
            has_citation: Some(
                candidate.source == ResponseSource::KnowledgeBase && candidate.kb_match.is_some(),
            ),
            is_escalated: None,
            critic_confidence: Some(critics.overall_confidence),
            ethical_override: Some(next_state.ethical_override),
            action: Some("respond".to_string()),
        };
        let mut metadata = candidate.metadata.clone();
        metadata.merge_missing(&computed);

        let mut history = request.history.clone();
        history.push(
            ConversationMessage::assistant(candidate.text.clone()).with_metadata(metadata),
        );

        let trace = self.builder.build(&history)?;
        let results = self.checker.verify_all(&trace, &self.registry);
        let safe_trace = self.checker.is_safe_trace(&trace, &self.registry);
        let violations: Vec<PolicyViolation> = results
            .iter()
            .filter_map(PolicyViolation::from_result)
            .collect();

        let verdict = decide_verdict(&critics, &violations, self.revision_confidence);
        debug!(
            conversation_id = %request.conversation_id,
            states = trace.len(),
            violations = violations.len(),
            safe_trace = safe_trace,
            "Policies checked"
        );

        self.sink.record(GovernanceEvent::DecisionMade {
            conversation_id: request.conversation_id.clone(),
            verdict,
            confidence: Some(critics.overall_confidence),
        });
        info!(
            "⚖️ Decision for conversation '{}': {}",
            request.conversation_id, verdict
        );

        Ok(Decision {
            decision_id: Uuid::new_v4(),
            conversation_id: request.conversation_id.clone(),
            decided_at: Utc::now(),
            verdict,
            affective: Some(AffectiveSnapshot::from(&next_state)),
            next_state: Some(next_state),
            critics: Some(critics),
            violations,
            safe_trace,
            failure: None,
        })
    }

    fn fail_safe(&self, request: &DecisionRequest, reason: String) -> Decision {
        error!(
            "🚨 Governance pipeline failed for conversation '{}': {}",
            request.conversation_id, reason
        );
        self.sink.record(GovernanceEvent::InternalFailure {
            conversation_id: request.conversation_id.clone(),
            reason: reason.clone(),
        });
        self.sink.record(GovernanceEvent::DecisionMade {
            conversation_id: request.conversation_id.clone(),
            verdict: Verdict::Escalate,
            confidence: None,
        });

        Decision {
            decision_id: Uuid::new_v4(),
            conversation_id: request.conversation_id.clone(),
            decided_at: Utc::now(),
            verdict: Verdict::Escalate,
            affective: None,
            next_state: None,
            critics: None,
            violations: Vec::new(),
            safe_trace: false,
            failure: Some(reason),
        }
    }
}

/// Escalate on critic escalation or a critical violation; revise on critic
/// failure, middling confidence or lesser violations; proceed otherwise.
pub fn decide_verdict(
    critics: &MasterCriticResult,
    violations: &[PolicyViolation],
    revision_confidence: f64,
) -> Verdict {
    if critics.escalate || violations.iter().any(|v| v.severity == Severity::Critical) {
        Verdict::Escalate
    } else if !critics.passed
        || critics.overall_confidence < revision_confidence
        || !violations.is_empty()
    {
        Verdict::Revise
    } else {
        Verdict::Proceed
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic: unknown payload".to_string()
    }
}
