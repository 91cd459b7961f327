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

use vigil_contracts::ResponseSource;

use crate::critics::lexicon::{
    claims_scarcity, contains_any, count_matches, HIGH_PRESSURE, HUMAN_EXPERTISE,
    MODERATE_SUGGESTION, PRICE_HISTORY, SOFT_OFFER,
};
use crate::critics::{Critic, CriticContext, CriticKind, CriticResult};

const HIGH_PRESSURE_WEIGHT: f64 = 1.0;
const MODERATE_WEIGHT: f64 = 0.5;
const SOFT_WEIGHT: f64 = 0.2;

/// Weighted share of sales-pressure phrasing, in [0, 1]. Zero when the text
/// contains no persuasion phrase at all.
pub fn persuasion_intensity(text: &str) -> f64 {
    let high = count_matches(text, HIGH_PRESSURE) as f64;
    let moderate = count_matches(text, MODERATE_SUGGESTION) as f64;
    let soft = count_matches(text, SOFT_OFFER) as f64;
    let total = high + moderate + soft;
    if total == 0.0 {
        return 0.0;
    }
    (high * HIGH_PRESSURE_WEIGHT + moderate * MODERATE_WEIGHT + soft * SOFT_WEIGHT) / total
}

#[derive(Debug, Clone)]
pub struct EthicalCritic {
    default_limit: f64,
}

impl EthicalCritic {
    pub fn new(default_limit: f64) -> Self {
        Self { default_limit }
    }
}

impl Default for EthicalCritic {
    fn default() -> Self {
        Self::new(0.7)
    }
}

impl Critic for EthicalCritic {
    fn kind(&self) -> CriticKind {
        CriticKind::Ethical
    }

    fn evaluate(&self, ctx: &CriticContext) -> CriticResult {
        let mut result = CriticResult::new(self.kind());
        let response = ctx.response.as_str();

        let intensity = persuasion_intensity(response);
        result.score = Some(intensity);
        let limit = ctx.persuasion_limit.unwrap_or(self.default_limit);
        if intensity > limit {
            result.issue(
                0.5,
                format!("Persuasion intensity {intensity:.2} exceeds limit {limit:.2}"),
            );
            result.recommend("Replace high-pressure phrasing with a neutral offer");
        }

        if claims_scarcity(response) && ctx.source != ResponseSource::KnowledgeBase {
            result.issue(0.6, "Urgency or scarcity claim not backed by the knowledge base");
            result.recommend("Remove stock or deadline claims unless the catalog confirms them");
        }

        if contains_any(response, HUMAN_EXPERTISE) {
            result.issue(0.7, "Response claims human expertise or personal certainty");
            result.recommend("Do not present the assistant as a human expert");
        }

        if contains_any(response, PRICE_HISTORY) && ctx.kb_match.is_none() {
            result.issue(0.7, "Unsupported claim about previous or future prices");
        }

        result.settle()
    }
}
