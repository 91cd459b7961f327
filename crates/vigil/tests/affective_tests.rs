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

use std::sync::Arc;
use vigil::affective::{AffectiveState, AffectiveTracker, FeatureVector, SituationalContext};
use vigil::config::AffectiveConfig;
use vigil::logging::{GovernanceEvent, RecordingSink};
use vigil::GovernanceError;

fn tracker(config: AffectiveConfig) -> (AffectiveTracker, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    (AffectiveTracker::new(config, sink.clone()), sink)
}

fn run(
    tracker: &AffectiveTracker,
    features: &FeatureVector,
    situational: &SituationalContext,
    steps: usize,
) -> AffectiveState {
    let mut state = AffectiveState::initial();
    for _ in 0..steps {
        state = tracker.update(&state, features, situational).unwrap();
    }
    state
}

#[test]
fn test_emotional_state_converges_to_constant_input() {
    let config = AffectiveConfig::default();
    let time_constant = config.time_constant().unwrap();
    let (tracker, _) = tracker(config);

    let features = FeatureVector {
        sentiment: 0.8,
        tonality: 0.5,
        product_view_count: 4,
        ..Default::default()
    };
    let target = (0.6 * 0.8 + 0.3 * 0.5 + 0.1 * 0.4_f64).tanh();

    let steps = (5.0 * time_constant).ceil() as usize;
    let state = run(&tracker, &features, &SituationalContext::default(), steps);

    // error shrinks by rho per step from |0 - target|
    let bound = 0.7_f64.powi(steps as i32) * target.abs();
    assert!((state.emotional - target).abs() <= bound + 1e-12);
    assert!((state.emotional - target).abs() < 0.01);

    let errors: Vec<f64> = state
        .emotional_history
        .iter()
        .map(|h| (h - target).abs())
        .collect();
    assert_eq!(errors.len(), steps + 1);
    for (t, pair) in errors.windows(2).enumerate() {
        assert!(
            pair[1] <= pair[0] + 1e-12,
            "error grew at step {}: {} -> {}",
            t + 1,
            pair[0],
            pair[1]
        );
        assert!((pair[1] - 0.7 * pair[0]).abs() < 1e-12);
    }
}

#[test]
fn test_histories_track_timestep() {
    let (tracker, _) = tracker(AffectiveConfig::default());
    let state = run(
        &tracker,
        &FeatureVector::default(),
        &SituationalContext::default(),
        6,
    );
    assert_eq!(state.timestep, 6);
    assert_eq!(state.emotional_history.len(), 7);
    assert_eq!(state.persuasion_history.len(), 7);
    assert_eq!(state.emotional_history[0], 0.0);
}

#[test]
fn test_frustration_vetoes_persuasion() {
    let (tracker, sink) = tracker(AffectiveConfig::default());
    let prev = AffectiveState {
        emotional: -0.9,
        ..AffectiveState::initial()
    };
    let features = FeatureVector {
        sentiment: -1.0,
        tonality: -1.0,
        ..Default::default()
    };
    let situational = SituationalContext {
        cart_value: 1500.0,
        time_in_funnel: 45.0,
        abandonment_risk: 0.9,
        ..Default::default()
    };

    let next = tracker.update(&prev, &features, &situational).unwrap();
    assert!(next.emotional < -0.5);
    assert_eq!(next.persuasion, 0.0);
    assert!(next.ethical_override);
    assert_eq!(
        sink.count_where(|e| matches!(e, GovernanceEvent::EthicalOverride { timestep: 1, .. })),
        1
    );
}

#[test]
fn test_persuasion_never_exceeds_ceiling() {
    let config = AffectiveConfig {
        max_persuasion: 0.3,
        ..Default::default()
    };
    let (tracker, _) = tracker(config);
    let features = FeatureVector {
        sentiment: 1.0,
        tonality: 1.0,
        product_view_count: 20,
        ..Default::default()
    };
    let situational = SituationalContext {
        cart_value: 5000.0,
        time_in_funnel: 60.0,
        abandonment_risk: 1.0,
        message_count: 30,
        product_view_count: 30,
        click_through_rate: 1.0,
    };
    let state = run(&tracker, &features, &situational, 10);
    assert!(state.persuasion <= 0.3);
    assert!(state.persuasion_history.iter().all(|p| *p <= 0.3));
}

#[test]
fn test_unstable_persistence_is_rejected_before_any_work() {
    let config = AffectiveConfig {
        persistence: -1.2,
        ..Default::default()
    };
    let (tracker, sink) = tracker(config);
    let result = tracker.update(
        &AffectiveState::initial(),
        &FeatureVector::default(),
        &SituationalContext::default(),
    );
    assert!(matches!(
        result,
        Err(GovernanceError::StabilityViolation { persistence_abs }) if persistence_abs == 1.2
    ));
    assert!(sink.events().is_empty());
}

#[test]
fn test_unstable_persistence_without_enforcement_warns() {
    let config = AffectiveConfig {
        persistence: 1.0,
        enforce_stability: false,
        ..Default::default()
    };
    let (tracker, sink) = tracker(config);
    let state = tracker
        .update(
            &AffectiveState::initial(),
            &FeatureVector::default(),
            &SituationalContext::default(),
        )
        .unwrap();
    assert_eq!(state.timestep, 1);
    assert_eq!(
        sink.count_where(|e| matches!(e, GovernanceEvent::UnstablePersistence { .. })),
        1
    );
}

#[test]
fn test_short_weight_vector_uses_common_prefix() {
    let config = AffectiveConfig {
        weights: vec![1.0],
        ..Default::default()
    };
    let (tracker, sink) = tracker(config);
    let features = FeatureVector {
        sentiment: 0.5,
        tonality: -1.0,
        ..Default::default()
    };
    let state = tracker
        .update(
            &AffectiveState::initial(),
            &features,
            &SituationalContext::default(),
        )
        .unwrap();

    let expected = 0.3 * 0.5_f64.tanh();
    assert!((state.emotional - expected).abs() < 1e-12);
    assert_eq!(
        sink.count_where(|e| matches!(
            e,
            GovernanceEvent::DimensionMismatch {
                features: 3,
                weights: 1
            }
        )),
        1
    );
}
