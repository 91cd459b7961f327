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

use serde::{Deserialize, Serialize};
use tracing::debug;
use vigil_contracts::{GovernanceError, GovernanceResult};

use crate::affective::signals::{context_signal, situational_urgency, SituationalContext};
use crate::config::AffectiveConfig;
use crate::logging::{tracing_sink, GovernanceEvent, SharedSink};

/// Emotional values below this mark the customer as frustrated and veto persuasion.
pub const FRUSTRATION_THRESHOLD: f64 = -0.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureVector {
    pub sentiment: f64,
    pub tonality: f64,
    pub response_latency: f64,
    pub message_length: f64,
    pub question_count: u32,
    pub product_view_count: u32,
}

impl FeatureVector {
    /// Inputs of the emotional recurrence, in weight order.
    pub fn recurrence_inputs(&self) -> [f64; 3] {
        [
            self.sentiment,
            self.tonality,
            f64::from(self.product_view_count) / 10.0,
        ]
    }
}

/// Per-conversation snapshot. Updates produce a new value; nothing here is
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectiveState {
    pub emotional: f64,
    pub persuasion: f64,
    pub intensity: f64,
    pub situational: f64,
    pub context: f64,
    pub timestep: u64,
    pub emotional_history: Vec<f64>,
    pub persuasion_history: Vec<f64>,
    /// Set when the frustration veto replaced the computed persuasion.
    #[serde(default)]
    pub ethical_override: bool,
}

impl Default for AffectiveState {
    fn default() -> Self {
        Self::initial()
    }
}

impl AffectiveState {
    pub fn initial() -> Self {
        Self {
            emotional: 0.0,
            persuasion: 0.0,
            intensity: 0.0,
            situational: 0.0,
            context: 0.0,
            timestep: 0,
            emotional_history: vec![0.0],
            persuasion_history: vec![0.0],
            ethical_override: false,
        }
    }

    pub fn is_frustrated(&self) -> bool {
        self.emotional < FRUSTRATION_THRESHOLD
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn finite(quantity: &'static str, value: f64) -> GovernanceResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GovernanceError::NonFiniteValue { quantity, value })
    }
}

pub struct AffectiveTracker {
    config: AffectiveConfig,
    sink: SharedSink,
}

impl AffectiveTracker {
    pub fn new(config: AffectiveConfig, sink: SharedSink) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &AffectiveConfig {
        &self.config
    }

    /// Advances `prev` by one turn.
    ///
    /// Fails with [`GovernanceError::StabilityViolation`] before anything is
    /// computed when stability is enforced and |rho| >= 1.
    pub fn update(
        &self,
        prev: &AffectiveState,
        features: &FeatureVector,
        situational: &SituationalContext,
    ) -> GovernanceResult<AffectiveState> {
        let config = &self.config;
        let report = config.validate();
        if !report.stable {
            if config.enforce_stability {
                return Err(GovernanceError::StabilityViolation {
                    persistence_abs: config.persistence.abs(),
                });
            }
            self.sink.record(GovernanceEvent::UnstablePersistence {
                persistence: config.persistence,
            });
        }
        if !report.intensity_weights_balanced {
            self.sink.record(GovernanceEvent::IntensityWeightDrift {
                sum: report.intensity_weight_sum,
            });
        }

        let s = situational_urgency(situational);
        let c = context_signal(situational);

        let inputs = features.recurrence_inputs();
        if inputs.len() != config.weights.len() {
            self.sink.record(GovernanceEvent::DimensionMismatch {
                features: inputs.len(),
                weights: config.weights.len(),
            });
        }
        // zip stops at the shorter of the two
        let weighted: f64 = inputs
            .iter()
            .zip(config.weights.iter())
            .map(|(x, w)| x * w)
            .sum();
        let new_input = weighted.tanh();

        let rho = config.persistence;
        // NaN survives clamp and fails every comparison, so it would skip the veto
        let emotional = finite(
            "emotional state",
            (rho * prev.emotional + (1.0 - rho) * new_input).clamp(-1.0, 1.0),
        )?;

        let [k1, k2, k3] = config.intensity_weights;
        let emotional01 = (emotional + 1.0) / 2.0;
        let intensity = finite("intensity", k1 * s + k2 * emotional01 + k3 * c)?;

        let computed_persuasion = config.max_persuasion.min(sigmoid(2.0 * (intensity - 0.5)));
        let timestep = prev.timestep + 1;

        let ethical_override = emotional < FRUSTRATION_THRESHOLD;
        let persuasion = if ethical_override {
            self.sink.record(GovernanceEvent::EthicalOverride {
                timestep,
                emotional,
                computed_persuasion,
            });
            0.0
        } else {
            computed_persuasion.max(0.0)
        };

        debug!(
            timestep = timestep,
            emotional = emotional,
            persuasion = persuasion,
            intensity = intensity,
            "Affective state updated"
        );

        let mut emotional_history = prev.emotional_history.clone();
        emotional_history.push(emotional);
        let mut persuasion_history = prev.persuasion_history.clone();
        persuasion_history.push(persuasion);

        Ok(AffectiveState {
            emotional,
            persuasion,
            intensity,
            situational: s,
            context: c,
            timestep,
            emotional_history,
            persuasion_history,
            ethical_override,
        })
    }
}

/// One-shot update that reports events through `tracing`.
pub fn update_state(
    prev: &AffectiveState,
    features: &FeatureVector,
    situational: &SituationalContext,
    config: &AffectiveConfig,
) -> GovernanceResult<AffectiveState> {
    AffectiveTracker::new(config.clone(), tracing_sink()).update(prev, features, situational)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RecordingSink;
    use std::sync::Arc;

    fn calm_features() -> FeatureVector {
        FeatureVector {
            sentiment: 0.4,
            tonality: 0.2,
            product_view_count: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_state_histories() {
        let state = AffectiveState::initial();
        assert_eq!(state.timestep, 0);
        assert_eq!(state.emotional_history.len(), 1);
        assert_eq!(state.persuasion_history.len(), 1);
    }

    #[test]
    fn test_update_increments_timestep_and_history() {
        let config = AffectiveConfig::default();
        let mut state = AffectiveState::initial();
        for _ in 0..4 {
            state = update_state(
                &state,
                &calm_features(),
                &SituationalContext::default(),
                &config,
            )
            .unwrap();
        }
        assert_eq!(state.timestep, 4);
        assert_eq!(state.emotional_history.len(), 5);
        assert_eq!(state.persuasion_history.len(), 5);
        assert!(state.persuasion <= config.max_persuasion);
    }

    #[test]
    fn test_unstable_persistence_is_rejected() {
        let config = AffectiveConfig {
            persistence: -1.0,
            ..Default::default()
        };
        let prev = AffectiveState::initial();
        let result = update_state(
            &prev,
            &calm_features(),
            &SituationalContext::default(),
            &config,
        );
        assert!(matches!(
            result,
            Err(GovernanceError::StabilityViolation { .. })
        ));
    }

    #[test]
    fn test_unstable_persistence_without_enforcement_warns() {
        let sink = Arc::new(RecordingSink::new());
        let config = AffectiveConfig {
            persistence: 1.2,
            enforce_stability: false,
            ..Default::default()
        };
        let tracker = AffectiveTracker::new(config, sink.clone());
        let next = tracker
            .update(
                &AffectiveState::initial(),
                &calm_features(),
                &SituationalContext::default(),
            )
            .unwrap();
        assert!(next.emotional >= -1.0 && next.emotional <= 1.0);
        assert_eq!(
            sink.count_where(|e| matches!(e, GovernanceEvent::UnstablePersistence { .. })),
            1
        );
    }

    #[test]
    fn test_short_weight_vector_uses_prefix() {
        let sink = Arc::new(RecordingSink::new());
        let config = AffectiveConfig {
            persistence: 0.0,
            weights: vec![1.0],
            ..Default::default()
        };
        let tracker = AffectiveTracker::new(config, sink.clone());
        let features = FeatureVector {
            sentiment: 0.5,
            tonality: 0.9,
            product_view_count: 10,
            ..Default::default()
        };
        let next = tracker
            .update(
                &AffectiveState::initial(),
                &features,
                &SituationalContext::default(),
            )
            .unwrap();
        assert!((next.emotional - 0.5_f64.tanh()).abs() < 1e-12);
        assert_eq!(
            sink.count_where(|e| matches!(e, GovernanceEvent::DimensionMismatch { .. })),
            1
        );
    }

    #[test]
    fn test_unbalanced_intensity_weights_only_warn() {
        let sink = Arc::new(RecordingSink::new());
        let config = AffectiveConfig {
            intensity_weights: [0.5, 0.5, 0.5],
            ..Default::default()
        };
        let tracker = AffectiveTracker::new(config, sink.clone());
        let next = tracker.update(
            &AffectiveState::initial(),
            &calm_features(),
            &SituationalContext::default(),
        );
        assert!(next.is_ok());
        assert_eq!(
            sink.count_where(|e| matches!(e, GovernanceEvent::IntensityWeightDrift { .. })),
            1
        );
    }

    #[test]
    fn test_nan_feature_is_rejected() {
        let features = FeatureVector {
            sentiment: f64::NAN,
            ..calm_features()
        };
        let result = update_state(
            &AffectiveState::initial(),
            &features,
            &SituationalContext::default(),
            &AffectiveConfig::default(),
        );
        assert!(matches!(
            result,
            Err(GovernanceError::NonFiniteValue {
                quantity: "emotional state",
                ..
            })
        ));
    }

    #[test]
    fn test_nan_intensity_weight_is_rejected() {
        let config = AffectiveConfig {
            intensity_weights: [f64::NAN, 0.3, 0.3],
            ..Default::default()
        };
        let result = update_state(
            &AffectiveState::initial(),
            &calm_features(),
            &SituationalContext::default(),
            &config,
        );
        assert!(matches!(
            result,
            Err(GovernanceError::NonFiniteValue {
                quantity: "intensity",
                ..
            })
        ));
    }

    #[test]
    fn test_infinite_feature_saturates() {
        let features = FeatureVector {
            sentiment: f64::NEG_INFINITY,
            ..Default::default()
        };
        let next = update_state(
            &AffectiveState::initial(),
            &features,
            &SituationalContext::default(),
            &AffectiveConfig::default(),
        )
        .unwrap();
        let ceiling = AffectiveConfig::default().max_persuasion;
        assert!((-1.0..=1.0).contains(&next.emotional));
        assert!((0.0..=ceiling).contains(&next.persuasion));
    }

    #[test]
    fn test_veto_emits_event() {
        let sink = Arc::new(RecordingSink::new());
        let config = AffectiveConfig {
            persistence: 0.0,
            ..Default::default()
        };
        let tracker = AffectiveTracker::new(config, sink.clone());
        let angry = FeatureVector {
            sentiment: -1.0,
            tonality: -1.0,
            ..Default::default()
        };
        let next = tracker
            .update(
                &AffectiveState::initial(),
                &angry,
                &SituationalContext::default(),
            )
            .unwrap();
        assert!(next.ethical_override);
        assert_eq!(next.persuasion, 0.0);
        assert_eq!(
            sink.count_where(|e| matches!(e, GovernanceEvent::EthicalOverride { .. })),
            1
        );
    }
}
