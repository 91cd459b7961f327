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

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use vigil_contracts::{Severity, Verdict};

/// Structured events raised by the pipeline. These replace ad hoc log lines so
/// callers can route them to an audit store as well as to `tracing`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GovernanceEvent {
    EthicalOverride {
        timestep: u64,
        emotional: f64,
        computed_persuasion: f64,
    },
    UnstablePersistence {
        persistence: f64,
    },
    IntensityWeightDrift {
        sum: f64,
    },
    DimensionMismatch {
        features: usize,
        weights: usize,
    },
    UnknownPredicate {
        name: String,
    },
    FormulaTooDeep {
        depth: usize,
        max: usize,
    },
    PolicyViolated {
        policy_id: String,
        severity: Severity,
        state_index: usize,
    },
    DecisionMade {
        conversation_id: String,
        verdict: Verdict,
        confidence: Option<f64>,
    },
    InternalFailure {
        conversation_id: String,
        reason: String,
    },
}

pub trait GovernanceSink: Send + Sync {
    fn record(&self, event: GovernanceEvent);
}

pub type SharedSink = Arc<dyn GovernanceSink>;

/// Forwards every event to `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl GovernanceSink for TracingSink {
    fn record(&self, event: GovernanceEvent) {
        match event {
            GovernanceEvent::EthicalOverride {
                timestep,
                emotional,
                computed_persuasion,
            } => warn!(
                timestep = timestep,
                emotional = emotional,
                computed_persuasion = computed_persuasion,
                "Ethical override: persuasion forced to zero"
            ),
            GovernanceEvent::UnstablePersistence { persistence } => warn!(
                persistence = persistence,
                "Persistence outside (-1, 1) with stability enforcement disabled"
            ),
            GovernanceEvent::IntensityWeightDrift { sum } => {
                warn!(sum = sum, "Intensity weights do not sum to 1.0")
            }
            GovernanceEvent::DimensionMismatch { features, weights } => debug!(
                features = features,
                weights = weights,
                "Feature/weight length mismatch, using the shorter length"
            ),
            GovernanceEvent::UnknownPredicate { name } => {
                warn!(predicate = %name, "Unknown predicate evaluated as false")
            }
            GovernanceEvent::FormulaTooDeep { depth, max } => warn!(
                depth = depth,
                max = max,
                "Formula deeper than the checker limit treated as violated"
            ),
            GovernanceEvent::PolicyViolated {
                policy_id,
                severity,
                state_index,
            } => warn!(
                policy = %policy_id,
                severity = %severity,
                state_index = state_index,
                "Policy violated"
            ),
            GovernanceEvent::DecisionMade {
                conversation_id,
                verdict,
                confidence,
            } => info!(
                conversation = %conversation_id,
                verdict = %verdict,
                confidence = ?confidence,
                "Decision made"
            ),
            GovernanceEvent::InternalFailure {
                conversation_id,
                reason,
            } => error!(
                conversation = %conversation_id,
                reason = %reason,
                "Internal failure, defaulting to escalate"
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<GovernanceEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GovernanceEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count_where(&self, predicate: impl Fn(&GovernanceEvent) -> bool) -> usize {
        self.events()
            .iter()
            .filter(|event| predicate(event))
            .count()
    }
}

impl GovernanceSink for RecordingSink {
    fn record(&self, event: GovernanceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

pub fn tracing_sink() -> SharedSink {
    Arc::new(TracingSink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.record(GovernanceEvent::UnknownPredicate {
            name: "mood".to_string(),
        });
        sink.record(GovernanceEvent::IntensityWeightDrift { sum: 1.2 });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], GovernanceEvent::UnknownPredicate { .. }));
        assert_eq!(
            sink.count_where(|e| matches!(e, GovernanceEvent::IntensityWeightDrift { .. })),
            1
        );
    }

    #[test]
    fn test_event_serialises_with_tag() {
        let value = serde_json::to_value(GovernanceEvent::DimensionMismatch {
            features: 3,
            weights: 2,
        })
        .unwrap();
        assert_eq!(value["event"], "dimension_mismatch");
        assert_eq!(value["weights"], 2);
    }
}
