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

use crate::critics::currency::{extract_currency_tokens, extract_quantities, parse_amount};
use crate::critics::{Critic, CriticContext, CriticKind, CriticResult};

pub const MAX_PLAUSIBLE_AMOUNT: f64 = 100_000_000.0;
pub const MAX_DECIMAL_DIGITS: usize = 2;
pub const QUANTITY_RANGE: (u64, u64) = (1, 10_000);

/// Cross-checks every amount and quantity quoted in the response.
#[derive(Debug, Clone)]
pub struct NumericCritic {
    cart_tolerance: f64,
}

impl NumericCritic {
    pub fn new(cart_tolerance: f64) -> Self {
        Self { cart_tolerance }
    }
}

impl Default for NumericCritic {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl Critic for NumericCritic {
    fn kind(&self) -> CriticKind {
        CriticKind::Numeric
    }

    fn evaluate(&self, ctx: &CriticContext) -> CriticResult {
        let mut result = CriticResult::new(self.kind());
        let mut last_value = None;

        for token in extract_currency_tokens(&ctx.response) {
            let Some(amount) = parse_amount(token) else {
                result.issue(0.7, format!("Could not parse amount '{token}'"));
                continue;
            };

            if amount.value.is_nan() || amount.value < 0.0 || amount.value > MAX_PLAUSIBLE_AMOUNT {
                result.issue(0.3, format!("Implausible amount {token}"));
            } else if amount.decimals > MAX_DECIMAL_DIGITS {
                result.issue(
                    0.6,
                    format!("Amount {token} has {} decimal digits", amount.decimals),
                );
            }
            last_value = Some(amount.value);
        }

        if let (Some(quoted), Some(cart)) = (last_value, ctx.cart_value) {
            debug!(quoted = quoted, cart = cart, "Comparing quoted total with cart");
            if (quoted - cart).abs() > self.cart_tolerance {
                result.issue(
                    0.3,
                    format!("Total mismatch: response quotes {quoted:.2}, cart total is {cart:.2}"),
                );
                result.recommend("Quote the authoritative cart total");
            }
        }

        let (min_qty, max_qty) = QUANTITY_RANGE;
        for quantity in extract_quantities(&ctx.response) {
            match quantity {
                Some(n) if (min_qty..=max_qty).contains(&n) => {}
                Some(n) => result.issue(
                    0.6,
                    format!("Quantity {n}x outside {min_qty}..={max_qty}"),
                ),
                None => result.issue(0.6, "Quantity too large to represent"),
            }
        }

        result.settle()
    }
}
