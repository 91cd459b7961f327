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

use crate::policy::ast::{Formula, Predicate};
use vigil_contracts::{GovernanceError, GovernanceResult, MessageRole};

/// Parses the canonical text form produced by `Formula`'s `Display` impl:
///
/// ```text
/// globally(implies(risk > 0.7, obligation(escalated)))
/// until(has_citation, !frustrated)
/// ```
///
/// Unrecognised predicate names parse to `Predicate::Unknown` so that a
/// tenant typo fails closed at evaluation time instead of at load time.
pub struct FormulaParser;

impl FormulaParser {
    pub fn parse(text: &str, max_depth: usize) -> GovernanceResult<Formula> {
        let mut cursor = Cursor {
            input: text.as_bytes(),
            pos: 0,
            max_depth,
        };
        let formula = cursor.formula(1)?;
        cursor.skip_whitespace();
        if cursor.pos < cursor.input.len() {
            return Err(cursor.error("unexpected trailing input"));
        }
        Ok(formula)
    }
}

#[derive(Clone, Copy)]
enum Arity {
    Unary(fn(Formula) -> Formula),
    Binary(fn(Formula, Formula) -> Formula),
}

fn operator(name: &str) -> Option<Arity> {
    let arity = match name {
        "not" => Arity::Unary(Formula::not),
        "globally" => Arity::Unary(Formula::globally),
        "finally" => Arity::Unary(Formula::finally),
        "next" => Arity::Unary(Formula::next),
        "obligation" => Arity::Unary(Formula::obligation),
        "permission" => Arity::Unary(Formula::permission),
        "forbidden" => Arity::Unary(Formula::forbidden),
        "and" => Arity::Binary(Formula::and),
        "or" => Arity::Binary(Formula::or),
        "implies" => Arity::Binary(Formula::implies),
        "until" => Arity::Binary(Formula::until),
        _ => return None,
    };
    Some(arity)
}

fn flag_predicate(name: &str) -> Option<Predicate> {
    let predicate = match name {
        "frustrated" => Predicate::CustomerFrustrated,
        "has_citation" => Predicate::HasCitation,
        "escalated" => Predicate::IsEscalated,
        "ethical_override" => Predicate::EthicalOverride,
        "authored_by_customer" => Predicate::AuthoredBy(MessageRole::Customer),
        "authored_by_assistant" => Predicate::AuthoredBy(MessageRole::Assistant),
        "authored_by_system" => Predicate::AuthoredBy(MessageRole::System),
        _ => return None,
    };
    Some(predicate)
}

fn is_comparison_field(name: &str) -> bool {
    matches!(name, "cart_value" | "risk" | "persuasion" | "sentiment")
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
    max_depth: usize,
}

impl Cursor<'_> {
    fn formula(&mut self, depth: usize) -> GovernanceResult<Formula> {
        if depth > self.max_depth {
            return Err(GovernanceError::FormulaTooDeep {
                depth,
                max: self.max_depth,
            });
        }

        self.skip_whitespace();
        if self.eat(b'!') {
            return Ok(Formula::not(self.formula(depth + 1)?));
        }

        let start = self.pos;
        let name = self.identifier()?;
        self.skip_whitespace();

        if self.peek() == Some(b'(') {
            let arity = operator(&name).ok_or_else(|| GovernanceError::FormulaParse {
                offset: start,
                message: format!("unknown operator '{name}'"),
            })?;
            self.pos += 1;
            let formula = match arity {
                Arity::Unary(build) => build(self.formula(depth + 1)?),
                Arity::Binary(build) => {
                    let left = self.formula(depth + 1)?;
                    self.expect(b',')?;
                    let right = self.formula(depth + 1)?;
                    build(left, right)
                }
            };
            self.expect(b')')?;
            return Ok(formula);
        }

        if operator(&name).is_some() {
            return Err(GovernanceError::FormulaParse {
                offset: start,
                message: format!("operator '{name}' expects arguments"),
            });
        }

        self.predicate(name, start).map(Formula::prop)
    }

    fn predicate(&mut self, name: String, start: usize) -> GovernanceResult<Predicate> {
        let comparison = match self.peek() {
            Some(op @ (b'>' | b'<')) => {
                self.pos += 1;
                Some((op, self.number()?))
            }
            _ => None,
        };

        let Some((op, (value, literal))) = comparison else {
            if is_comparison_field(&name) {
                return Err(GovernanceError::FormulaParse {
                    offset: start,
                    message: format!("'{name}' needs a comparison"),
                });
            }
            return Ok(flag_predicate(&name).unwrap_or_else(|| Predicate::Unknown(name)));
        };

        let predicate = match (name.as_str(), op) {
            ("cart_value", b'>') => Predicate::CartValueAbove(value),
            ("cart_value", b'<') => Predicate::CartValueBelow(value),
            ("risk", b'>') => Predicate::RiskAbove(value),
            ("persuasion", b'>') => Predicate::PersuasionAbove(value),
            ("sentiment", b'<') => Predicate::SentimentBelow(value),
            _ if is_comparison_field(&name) || flag_predicate(&name).is_some() => {
                return Err(GovernanceError::FormulaParse {
                    offset: start,
                    message: format!("unsupported comparison '{}' for '{name}'", op as char),
                });
            }
            _ => Predicate::Unknown(format!("{name} {} {literal}", op as char)),
        };
        Ok(predicate)
    }

    fn identifier(&mut self) -> GovernanceResult<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected an operator or predicate"));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn number(&mut self) -> GovernanceResult<(f64, String)> {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() || b == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let literal = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        let value = literal
            .parse::<f64>()
            .map_err(|_| GovernanceError::FormulaParse {
                offset: start,
                message: format!("invalid number '{literal}'"),
            })?;
        Ok((value, literal))
    }

    fn expect(&mut self, byte: u8) -> GovernanceResult<()> {
        self.skip_whitespace();
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> GovernanceError {
        GovernanceError::FormulaParse {
            offset: self.pos,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTH: usize = 64;

    #[test]
    fn test_parse_default_policy_shape() {
        let formula =
            FormulaParser::parse("globally(implies(risk > 0.7, obligation(escalated)))", DEPTH)
                .unwrap();
        assert_eq!(
            formula,
            Formula::globally(Formula::implies(
                Formula::prop(Predicate::RiskAbove(0.7)),
                Formula::obligation(Formula::prop(Predicate::IsEscalated)),
            ))
        );
    }

    #[test]
    fn test_display_output_parses_back() {
        let formula = Formula::and(
            Formula::until(
                Formula::prop(Predicate::AuthoredBy(MessageRole::Customer)),
                Formula::prop(Predicate::SentimentBelow(-0.5)),
            ),
            Formula::forbidden(Formula::prop(Predicate::CartValueBelow(10.0))),
        );
        let parsed = FormulaParser::parse(&formula.to_string(), DEPTH).unwrap();
        assert_eq!(parsed, formula);
    }

    #[test]
    fn test_bang_is_negation() {
        let formula = FormulaParser::parse("  ! frustrated ", DEPTH).unwrap();
        assert_eq!(
            formula,
            Formula::not(Formula::prop(Predicate::CustomerFrustrated))
        );
    }

    #[test]
    fn test_unknown_names_become_unknown_predicates() {
        let formula = FormulaParser::parse("globally(mood > 3)", DEPTH).unwrap();
        assert_eq!(
            formula,
            Formula::globally(Formula::prop(Predicate::Unknown("mood > 3".to_string())))
        );
        let bare = FormulaParser::parse("vip_customer", DEPTH).unwrap();
        assert_eq!(
            bare,
            Formula::prop(Predicate::Unknown("vip_customer".to_string()))
        );
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(
            FormulaParser::parse("eventually(escalated)", DEPTH),
            Err(GovernanceError::FormulaParse { offset: 0, .. })
        ));
        assert!(matches!(
            FormulaParser::parse("and(escalated)", DEPTH),
            Err(GovernanceError::FormulaParse { .. })
        ));
        assert!(matches!(
            FormulaParser::parse("risk < 0.2", DEPTH),
            Err(GovernanceError::FormulaParse { .. })
        ));
        assert!(matches!(
            FormulaParser::parse("risk", DEPTH),
            Err(GovernanceError::FormulaParse { .. })
        ));
        assert!(matches!(
            FormulaParser::parse("escalated)", DEPTH),
            Err(GovernanceError::FormulaParse { offset: 9, .. })
        ));
        assert!(matches!(
            FormulaParser::parse("globally", DEPTH),
            Err(GovernanceError::FormulaParse { .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let text = "next(next(next(escalated)))";
        assert!(FormulaParser::parse(text, 4).is_ok());
        assert!(matches!(
            FormulaParser::parse(text, 3),
            Err(GovernanceError::FormulaTooDeep { depth: 4, max: 3 })
        ));
    }
}
