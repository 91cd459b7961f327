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

/// Raw commercial context for one turn, as extracted by the runtime layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SituationalContext {
    pub cart_value: f64,
    /// Minutes since the conversation entered the funnel.
    pub time_in_funnel: f64,
    pub abandonment_risk: f64,
    pub message_count: u32,
    pub product_view_count: u32,
    pub click_through_rate: f64,
}

fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn saturate(value: f64, scale: f64) -> f64 {
    (value / scale).min(1.0)
}

/// S = clamp01(0.4 min(1, cart/1000) + 0.3 min(1, funnel/30) + 0.3 abandonment)
pub fn situational_urgency(ctx: &SituationalContext) -> f64 {
    clamp01(
        0.4 * saturate(ctx.cart_value, 1000.0)
            + 0.3 * saturate(ctx.time_in_funnel, 30.0)
            + 0.3 * ctx.abandonment_risk,
    )
}

/// C = clamp01(0.3 min(1, messages/10) + 0.4 min(1, views/5) + 0.3 ctr)
pub fn context_signal(ctx: &SituationalContext) -> f64 {
    clamp01(
        0.3 * saturate(f64::from(ctx.message_count), 10.0)
            + 0.4 * saturate(f64::from(ctx.product_view_count), 5.0)
            + 0.3 * ctx.click_through_rate,
    )
}
