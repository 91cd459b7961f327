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

pub mod currency;
pub mod ethical;
pub mod factual;
pub mod lexicon;
pub mod master;
pub mod numeric;
pub mod risk;

use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_contracts::ResponseSource;

pub use currency::{parse_amount, parse_currency, ParsedAmount};
pub use ethical::EthicalCritic;
pub use factual::FactualCritic;
pub use master::{MasterCritic, MasterCriticResult};
pub use numeric::NumericCritic;
pub use risk::RiskCritic;

/// Knowledge-base passage the response was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    pub source_text: String,
    #[serde(default)]
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticContext {
    /// Inbound customer message.
    pub message: String,
    /// Candidate response under review.
    pub response: String,
    pub source: ResponseSource,
    #[serde(default)]
    pub cart_value: Option<f64>,
    #[serde(default)]
    pub kb_match: Option<KnowledgeMatch>,
    /// Persuasion level reported by the affective tracker.
    #[serde(default)]
    pub persuasion_level: Option<f64>,
    /// Tenant-configured ceiling on persuasion intensity.
    #[serde(default)]
    pub persuasion_limit: Option<f64>,
}

impl CriticContext {
    pub fn new(
        message: impl Into<String>,
        response: impl Into<String>,
        source: ResponseSource,
    ) -> Self {
        Self {
            message: message.into(),
            response: response.into(),
            source,
            cart_value: None,
            kb_match: None,
            persuasion_level: None,
            persuasion_limit: None,
        }
    }

    pub fn with_cart_value(mut self, cart_value: f64) -> Self {
        self.cart_value = Some(cart_value);
        self
    }

    pub fn with_kb_match(mut self, source_text: impl Into<String>, similarity: f64) -> Self {
        self.kb_match = Some(KnowledgeMatch {
            source_text: source_text.into(),
            similarity,
        });
        self
    }

    pub fn with_persuasion_limit(mut self, limit: f64) -> Self {
        self.persuasion_limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticKind {
    Factual,
    Numeric,
    Ethical,
    Risk,
}

impl fmt::Display for CriticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriticKind::Factual => write!(f, "factual"),
            CriticKind::Numeric => write!(f, "numeric"),
            CriticKind::Ethical => write!(f, "ethical"),
            CriticKind::Risk => write!(f, "risk"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticResult {
    pub critic: CriticKind,
    pub passed: bool,
    pub confidence: f64,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    /// Raw score behind the verdict, for critics that compute one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl CriticResult {
    pub fn new(critic: CriticKind) -> Self {
        Self {
            critic,
            passed: true,
            confidence: 1.0,
            issues: Vec::new(),
            recommendations: Vec::new(),
            score: None,
        }
    }

    /// Multiplies the confidence by `factor`. Factors are clamped to [0, 1] so
    /// confidence never increases.
    pub fn penalise(&mut self, factor: f64) {
        self.confidence *= factor.clamp(0.0, 1.0);
    }

    pub fn issue(&mut self, factor: f64, issue: impl Into<String>) {
        self.penalise(factor);
        self.issues.push(issue.into());
    }

    pub fn recommend(&mut self, recommendation: impl Into<String>) {
        self.recommendations.push(recommendation.into());
    }

    /// Marks the result as passed iff no issue was recorded.
    pub fn settle(mut self) -> Self {
        self.passed = self.issues.is_empty();
        self
    }
}

pub trait Critic: Send + Sync {
    fn kind(&self) -> CriticKind;

    fn evaluate(&self, ctx: &CriticContext) -> CriticResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_never_increases() {
        let mut result = CriticResult::new(CriticKind::Numeric);
        result.penalise(0.5);
        result.penalise(3.0);
        assert_eq!(result.confidence, 0.5);
        result.penalise(-1.0);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_settle_fails_on_issue() {
        let mut result = CriticResult::new(CriticKind::Ethical);
        result.recommend("soften tone");
        assert!(result.clone().settle().passed);
        result.issue(0.9, "pressure");
        assert!(!result.settle().passed);
    }
}
