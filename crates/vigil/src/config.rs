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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct GovernanceConfig {
    pub affective: AffectiveConfig,
    pub critics: CriticConfig,
    pub checker: CheckerConfig,
    pub limits: LimitConfig,
}

/// Coefficients of the emotional recurrence and the persuasion mapping.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AffectiveConfig {
    /// rho; the recurrence is stable iff |rho| < 1.
    pub persistence: f64,
    /// Weights over [sentiment, tonality, product_views / 10].
    pub weights: Vec<f64>,
    pub max_persuasion: f64,
    /// kappa_1..kappa_3 over (situational, emotional, context).
    pub intensity_weights: [f64; 3],
    pub enforce_stability: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CriticConfig {
    pub default_persuasion_limit: f64,
    /// Overall confidence below this escalates.
    pub escalation_confidence: f64,
    /// Overall confidence below this (but above escalation) asks for a revision.
    pub revision_confidence: f64,
    pub cart_tolerance: f64,
    pub risk_pass_threshold: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CheckerConfig {
    pub max_formula_depth: usize,
    pub counterexample_mode: CounterexampleMode,
}

/// How a failing policy is turned into a reported state index.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CounterexampleMode {
    /// Descend into the failing sub-formula and report where it breaks.
    #[default]
    Localised,
    /// Re-evaluate the root formula at every index and report the first failure.
    WholeFormulaRescan,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LimitConfig {
    /// Most recent messages kept in an execution trace.
    pub max_trace_states: usize,
}

/// Result of checking an [`AffectiveConfig`] without running an update.
#[derive(Debug, Clone, PartialEq)]
pub struct AffectiveConfigReport {
    pub stable: bool,
    pub intensity_weight_sum: f64,
    pub intensity_weights_balanced: bool,
}

pub const INTENSITY_WEIGHT_TOLERANCE: f64 = 0.01;

impl GovernanceConfig {
    pub fn load_from_file(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)?;
        let config: GovernanceConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config/governance.toml")
    }

    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();
        Self::load_from_file(&config_path).unwrap_or_else(|_| Self::default())
    }
}

impl AffectiveConfig {
    pub fn is_stable(&self) -> bool {
        self.persistence.abs() < 1.0
    }

    pub fn intensity_weight_sum(&self) -> f64 {
        self.intensity_weights.iter().sum()
    }

    pub fn validate(&self) -> AffectiveConfigReport {
        let sum = self.intensity_weight_sum();
        AffectiveConfigReport {
            stable: self.is_stable(),
            intensity_weight_sum: sum,
            intensity_weights_balanced: (sum - 1.0).abs() <= INTENSITY_WEIGHT_TOLERANCE,
        }
    }

    /// Number of steps after which the memory of the previous value has decayed
    /// by a factor of e: T = -1 / ln|rho|. `None` when rho is 0 (no memory) or
    /// the recurrence is unstable.
    pub fn time_constant(&self) -> Option<f64> {
        let rho = self.persistence.abs();
        if rho == 0.0 || rho >= 1.0 {
            return None;
        }
        Some(-1.0 / rho.ln())
    }
}

impl Default for AffectiveConfig {
    fn default() -> Self {
        Self {
            persistence: 0.7,
            weights: vec![0.6, 0.3, 0.1],
            max_persuasion: 0.8,
            intensity_weights: [0.4, 0.3, 0.3],
            enforce_stability: true,
        }
    }
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            default_persuasion_limit: 0.7,
            escalation_confidence: 0.5,
            revision_confidence: 0.8,
            cart_tolerance: 0.01,
            risk_pass_threshold: 0.7,
        }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_formula_depth: 64,
            counterexample_mode: CounterexampleMode::Localised,
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_trace_states: 200,
        }
    }
}
