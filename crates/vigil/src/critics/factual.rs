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

use tracing::debug;
use vigil_contracts::ResponseSource;

use crate::critics::currency::has_currency_amount;
use crate::critics::lexicon::{contains_any, is_factual_question, ADDITION_CLAIMS, HIGH_CERTAINTY};
use crate::critics::{Critic, CriticContext, CriticKind, CriticResult};

const MISSING_SOURCE_PENALTY: f64 = 0.3;
const VERBOSE_PENALTY: f64 = 0.7;
const UNPRICED_ADDITION_PENALTY: f64 = 0.6;
const CERTAINTY_PENALTY: f64 = 0.85;
const MAX_EXPANSION_RATIO: usize = 3;

/// Checks that the response stays grounded in what the knowledge base said.
#[derive(Debug, Clone, Default)]
pub struct FactualCritic;

impl FactualCritic {
    pub fn new() -> Self {
        Self
    }
}

impl Critic for FactualCritic {
    fn kind(&self) -> CriticKind {
        CriticKind::Factual
    }

    fn evaluate(&self, ctx: &CriticContext) -> CriticResult {
        let mut result = CriticResult::new(self.kind());

        if ctx.source == ResponseSource::KnowledgeBase && ctx.kb_match.is_none() {
            result.issue(
                MISSING_SOURCE_PENALTY,
                "Knowledge-base response without a matched source passage",
            );
            result.recommend(
                "Fall back to the knowledge-base fallback reply or ask a clarifying question",
            );
        }

        if let Some(kb) = &ctx.kb_match {
            let source_len = kb.source_text.chars().count();
            let response_len = ctx.response.chars().count();
            if source_len > 0 && response_len > MAX_EXPANSION_RATIO * source_len {
                debug!(
                    source_len = source_len,
                    response_len = response_len,
                    "Response much longer than its source"
                );
                result.issue(
                    VERBOSE_PENALTY,
                    format!(
                        "Response ({response_len} chars) exceeds {MAX_EXPANSION_RATIO}x \
                         its source ({source_len} chars); possible fabrication"
                    ),
                );
                result.recommend("Trim the answer to what the source passage supports");
            }
        }

        if ctx.source == ResponseSource::AutonomousSales
            && contains_any(&ctx.response, ADDITION_CLAIMS)
            && !has_currency_amount(&ctx.response)
        {
            result.issue(
                UNPRICED_ADDITION_PENALTY,
                "Response claims an item was added without stating a price",
            );
            result.recommend("State the item price and the updated cart total");
        }

        if ctx.source == ResponseSource::Model
            && contains_any(&ctx.response, HIGH_CERTAINTY)
            && is_factual_question(&ctx.message)
        {
            result.penalise(CERTAINTY_PENALTY);
            result.recommend("Verify the answer against the knowledge base before sending");
        }

        result.settle()
    }
}
