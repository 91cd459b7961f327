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

use once_cell::sync::Lazy;
use regex::Regex;

static CURRENCY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-?(?:R\$|US\$|\$|€|£)\s?-?\d+(?:[.,]\d+)*").expect("currency pattern is valid")
});

static QUANTITY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s?x\b").expect("quantity pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedAmount {
    pub value: f64,
    /// Digits after the decimal separator once the locale has been resolved.
    pub decimals: usize,
}

/// Every currency-formatted token in `text`, in order of appearance.
pub fn extract_currency_tokens(text: &str) -> Vec<&str> {
    CURRENCY_TOKEN
        .find_iter(text)
        .map(|m| {
            let token = m.as_str();
            if token.starts_with('-') && joins_range(&text[..m.start()]) {
                &token[1..]
            } else {
                token
            }
        })
        .collect()
}

/// A `-` glued to the previous word or amount (`$10-$20`) separates a range
/// and is not a sign.
fn joins_range(before: &str) -> bool {
    before
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric())
}

pub fn has_currency_amount(text: &str) -> bool {
    CURRENCY_TOKEN.is_match(text)
}

/// Raw `N` of every `Nx` quantity token. Values too large for `u64` come back
/// as `None` so the caller can reject them.
pub fn extract_quantities(text: &str) -> Vec<Option<u64>> {
    QUANTITY_TOKEN
        .captures_iter(text)
        .map(|caps| caps.get(1).and_then(|m| m.as_str().parse().ok()))
        .collect()
}

/// Parses a currency token, resolving `.`/`,` between decimal and thousands
/// use:
///
/// * one separator followed by exactly three digits with a nonzero integer
///   part is a thousands separator, otherwise a decimal point;
/// * several separators of the same kind are all thousands separators;
/// * with both kinds present the last one is the decimal point.
pub fn parse_amount(token: &str) -> Option<ParsedAmount> {
    let negative = token.contains('-');
    let numeric: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let numeric = numeric.trim_matches(|c: char| c == '.' || c == ',');
    if !numeric.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let dots = numeric.matches('.').count();
    let commas = numeric.matches(',').count();

    let normalised = match (dots, commas) {
        (0, 0) => numeric.to_string(),
        (_, 0) | (0, _) => {
            let separator = if dots > 0 { '.' } else { ',' };
            let count = dots + commas;
            if count == 1 {
                let (integer, fraction) = numeric.split_once(separator)?;
                let nonzero_integer = integer.chars().any(|c| c != '0');
                if fraction.len() == 3 && nonzero_integer {
                    format!("{integer}{fraction}")
                } else {
                    format!("{integer}.{fraction}")
                }
            } else {
                numeric.replace(separator, "")
            }
        }
        _ => {
            let decimal_at = numeric.rfind(|c: char| c == '.' || c == ',')?;
            numeric
                .char_indices()
                .filter_map(|(i, c)| match c {
                    '.' | ',' if i == decimal_at => Some('.'),
                    '.' | ',' => None,
                    other => Some(other),
                })
                .collect()
        }
    };

    let decimals = normalised
        .split_once('.')
        .map(|(_, fraction)| fraction.len())
        .unwrap_or(0);
    let magnitude: f64 = normalised.parse().ok()?;
    let value = if negative { -magnitude } else { magnitude };

    Some(ParsedAmount { value, decimals })
}

pub fn parse_currency(token: &str) -> Option<f64> {
    parse_amount(token).map(|amount| amount.value)
}
