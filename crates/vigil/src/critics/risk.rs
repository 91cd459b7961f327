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

use crate::critics::lexicon::{count_matches, DISPUTE, FAILURE_ADMISSION, FRUSTRATION};
use crate::critics::{Critic, CriticContext, CriticKind, CriticResult};

const ELEVATED_CART: f64 = 500.0;
const HIGH_CART: f64 = 2000.0;
const LONG_MESSAGE_CHARS: usize = 1000;

const ELEVATED_CART_WEIGHT: f64 = 0.3;
const HIGH_CART_WEIGHT: f64 = 0.4;
const FRUSTRATION_WEIGHT: f64 = 0.15;
const FAILURE_WEIGHT: f64 = 0.2;
const DISPUTE_WEIGHT: f64 = 0.5;
const LONG_MESSAGE_WEIGHT: f64 = 0.1;

/// Financial and fraud exposure of letting the response through unattended.
#[derive(Debug, Clone)]
pub struct RiskCritic {
    pass_threshold: f64,
}

impl RiskCritic {
    pub fn new(pass_threshold: f64) -> Self {
        Self { pass_threshold }
    }

    fn add(result: &mut CriticResult, score: &mut f64, weight: f64) {
        *score += weight;
        result.penalise(1.0 - weight.min(0.9));
    }
}

impl Default for RiskCritic {
    fn default() -> Self {
        Self::new(0.7)
    }
}

impl Critic for RiskCritic {
    fn kind(&self) -> CriticKind {
        CriticKind::Risk
    }

    fn evaluate(&self, ctx: &CriticContext) -> CriticResult {
        let mut result = CriticResult::new(self.kind());
        let mut score = 0.0;

        let cart = ctx.cart_value.unwrap_or(0.0);
        if cart > ELEVATED_CART {
            Self::add(&mut result, &mut score, ELEVATED_CART_WEIGHT);
        }
        if cart > HIGH_CART {
            Self::add(&mut result, &mut score, HIGH_CART_WEIGHT);
            result
                .issues
                .push(format!("High-value cart ({cart:.2}) above {HIGH_CART:.0}"));
            result.recommend("Route high-value carts to a human sales agent");
        }

        let frustration = count_matches(&ctx.message, FRUSTRATION);
        if frustration > 0 {
            Self::add(&mut result, &mut score, FRUSTRATION_WEIGHT * frustration as f64);
            if frustration >= 2 {
                result
                    .issues
                    .push(format!("Customer frustration signals ({frustration} matches)"));
                result.recommend("Offer a human agent to the customer");
            }
        }

        if count_matches(&ctx.response, FAILURE_ADMISSION) > 0 {
            Self::add(&mut result, &mut score, FAILURE_WEIGHT);
        }

        if count_matches(&ctx.message, DISPUTE) > 0 {
            Self::add(&mut result, &mut score, DISPUTE_WEIGHT);
            result
                .issues
                .push("CRITICAL: dispute, refund or fraud language in customer message".into());
            result.recommend("CRITICAL: ESCALATE to a human agent before replying");
        }

        if ctx.message.chars().count() > LONG_MESSAGE_CHARS {
            Self::add(&mut result, &mut score, LONG_MESSAGE_WEIGHT);
        }

        debug!(score = score, frustration = frustration, "Risk assessed");
        result.score = Some(score);
        result.passed = score < self.pass_threshold;
        result
    }
}
