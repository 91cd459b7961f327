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

use crate::config::CriticConfig;
use crate::critics::{
    Critic, CriticContext, CriticResult, EthicalCritic, FactualCritic, NumericCritic, RiskCritic,
};

const ESCALATION_MARKERS: [&str; 2] = ["ESCALATE", "CRITICAL"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterCriticResult {
    /// Geometric mean of the four critic confidences.
    pub overall_confidence: f64,
    pub passed: bool,
    pub escalate: bool,
    pub escalation_reasons: Vec<String>,
    pub factual: CriticResult,
    pub numeric: CriticResult,
    pub ethical: CriticResult,
    pub risk: CriticResult,
    pub recommendation: String,
}

impl MasterCriticResult {
    pub fn results(&self) -> [&CriticResult; 4] {
        [&self.factual, &self.numeric, &self.ethical, &self.risk]
    }
}

/// Runs the four critics and folds them into one verdict.
#[derive(Debug, Clone)]
pub struct MasterCritic {
    factual: FactualCritic,
    numeric: NumericCritic,
    ethical: EthicalCritic,
    risk: RiskCritic,
    escalation_confidence: f64,
}

impl MasterCritic {
    pub fn new(config: &CriticConfig) -> Self {
        Self {
            factual: FactualCritic::new(),
            numeric: NumericCritic::new(config.cart_tolerance),
            ethical: EthicalCritic::new(config.default_persuasion_limit),
            risk: RiskCritic::new(config.risk_pass_threshold),
            escalation_confidence: config.escalation_confidence,
        }
    }

    pub fn evaluate(&self, ctx: &CriticContext) -> MasterCriticResult {
        let factual = self.factual.evaluate(ctx);
        let numeric = self.numeric.evaluate(ctx);
        let ethical = self.ethical.evaluate(ctx);
        let risk = self.risk.evaluate(ctx);

        let product =
            factual.confidence * numeric.confidence * ethical.confidence * risk.confidence;
        let overall_confidence = product.max(0.0).powf(0.25);
        let passed = factual.passed && numeric.passed && ethical.passed && risk.passed;

        let mut escalation_reasons = Vec::new();
        if !risk.passed {
            escalation_reasons.push("risk critic failed".to_string());
        }
        if overall_confidence < self.escalation_confidence {
            escalation_reasons.push(format!(
                "overall confidence {overall_confidence:.2} below {:.2}",
                self.escalation_confidence
            ));
        }
        if !factual.passed && !numeric.passed {
            escalation_reasons.push("factual and numeric critics both failed".to_string());
        }
        for result in [&factual, &numeric, &ethical, &risk] {
            let flagged = result
                .recommendations
                .iter()
                .any(|r| ESCALATION_MARKERS.iter().any(|marker| r.contains(marker)));
            if flagged {
                escalation_reasons.push(format!("{} critic requested escalation", result.critic));
            }
        }
        let escalate = !escalation_reasons.is_empty();

        let recommendation = if escalate {
            format!("Escalate to a human agent: {}", escalation_reasons.join("; "))
        } else if !passed {
            let issues: Vec<&str> = [&factual, &numeric, &ethical, &risk]
                .iter()
                .flat_map(|r| r.issues.iter().map(String::as_str))
                .collect();
            format!("Revise the response: {}", issues.join("; "))
        } else {
            "Response approved".to_string()
        };

        debug!(
            overall_confidence = overall_confidence,
            passed = passed,
            escalate = escalate,
            "Critic ensemble evaluated"
        );

        MasterCriticResult {
            overall_confidence,
            passed,
            escalate,
            escalation_reasons,
            factual,
            numeric,
            ethical,
            risk,
            recommendation,
        }
    }
}

impl Default for MasterCritic {
    fn default() -> Self {
        Self::new(&CriticConfig::default())
    }
}
