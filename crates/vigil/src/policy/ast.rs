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

use std::fmt;
use vigil_contracts::MessageRole;

/// Atomic propositions over a single trace state.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    CartValueAbove(f64),
    CartValueBelow(f64),
    RiskAbove(f64),
    PersuasionAbove(f64),
    SentimentBelow(f64),
    CustomerFrustrated,
    HasCitation,
    IsEscalated,
    EthicalOverride,
    AuthoredBy(MessageRole),
    /// Never matches. Evaluating it raises an unknown-predicate event.
    Unknown(String),
}

impl Predicate {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Predicate::Unknown(_))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::CartValueAbove(v) => write!(f, "cart_value > {v}"),
            Predicate::CartValueBelow(v) => write!(f, "cart_value < {v}"),
            Predicate::RiskAbove(v) => write!(f, "risk > {v}"),
            Predicate::PersuasionAbove(v) => write!(f, "persuasion > {v}"),
            Predicate::SentimentBelow(v) => write!(f, "sentiment < {v}"),
            Predicate::CustomerFrustrated => write!(f, "frustrated"),
            Predicate::HasCitation => write!(f, "has_citation"),
            Predicate::IsEscalated => write!(f, "escalated"),
            Predicate::EthicalOverride => write!(f, "ethical_override"),
            Predicate::AuthoredBy(role) => match role {
                MessageRole::Customer => write!(f, "authored_by_customer"),
                MessageRole::Assistant => write!(f, "authored_by_assistant"),
                MessageRole::System => write!(f, "authored_by_system"),
            },
            Predicate::Unknown(name) => write!(f, "{name}"),
        }
    }
}

/// Linear temporal logic with deontic operators, evaluated over finite traces.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    Prop(Predicate),

    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Implies(Box<Formula>, Box<Formula>),

    Globally(Box<Formula>),
    Finally(Box<Formula>),
    Next(Box<Formula>),
    Until(Box<Formula>, Box<Formula>),

    Obligation(Box<Formula>),
    Permission(Box<Formula>),
    Forbidden(Box<Formula>),
}

impl Formula {
    pub fn prop(predicate: Predicate) -> Self {
        Formula::Prop(predicate)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Formula) -> Self {
        Formula::Not(Box::new(operand))
    }

    pub fn and(left: Formula, right: Formula) -> Self {
        Formula::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Formula, right: Formula) -> Self {
        Formula::Or(Box::new(left), Box::new(right))
    }

    pub fn implies(antecedent: Formula, consequent: Formula) -> Self {
        Formula::Implies(Box::new(antecedent), Box::new(consequent))
    }

    pub fn globally(operand: Formula) -> Self {
        Formula::Globally(Box::new(operand))
    }

    pub fn finally(operand: Formula) -> Self {
        Formula::Finally(Box::new(operand))
    }

    pub fn next(operand: Formula) -> Self {
        Formula::Next(Box::new(operand))
    }

    pub fn until(hold: Formula, release: Formula) -> Self {
        Formula::Until(Box::new(hold), Box::new(release))
    }

    pub fn obligation(operand: Formula) -> Self {
        Formula::Obligation(Box::new(operand))
    }

    pub fn permission(operand: Formula) -> Self {
        Formula::Permission(Box::new(operand))
    }

    pub fn forbidden(operand: Formula) -> Self {
        Formula::Forbidden(Box::new(operand))
    }

    /// Height of the syntax tree; a bare proposition has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Formula::Prop(_) => 1,
            Formula::Not(inner)
            | Formula::Globally(inner)
            | Formula::Finally(inner)
            | Formula::Next(inner)
            | Formula::Obligation(inner)
            | Formula::Permission(inner)
            | Formula::Forbidden(inner) => 1 + inner.depth(),
            Formula::And(left, right)
            | Formula::Or(left, right)
            | Formula::Implies(left, right)
            | Formula::Until(left, right) => 1 + left.depth().max(right.depth()),
        }
    }

    /// Every predicate in the formula, left to right.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut found = Vec::new();
        self.collect_predicates(&mut found);
        found
    }

    fn collect_predicates<'a>(&'a self, found: &mut Vec<&'a Predicate>) {
        match self {
            Formula::Prop(predicate) => found.push(predicate),
            Formula::Not(inner)
            | Formula::Globally(inner)
            | Formula::Finally(inner)
            | Formula::Next(inner)
            | Formula::Obligation(inner)
            | Formula::Permission(inner)
            | Formula::Forbidden(inner) => inner.collect_predicates(found),
            Formula::And(left, right)
            | Formula::Or(left, right)
            | Formula::Implies(left, right)
            | Formula::Until(left, right) => {
                left.collect_predicates(found);
                right.collect_predicates(found);
            }
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Prop(predicate) => write!(f, "{predicate}"),
            Formula::Not(inner) => write!(f, "not({inner})"),
            Formula::And(left, right) => write!(f, "and({left}, {right})"),
            Formula::Or(left, right) => write!(f, "or({left}, {right})"),
            Formula::Implies(left, right) => write!(f, "implies({left}, {right})"),
            Formula::Globally(inner) => write!(f, "globally({inner})"),
            Formula::Finally(inner) => write!(f, "finally({inner})"),
            Formula::Next(inner) => write!(f, "next({inner})"),
            Formula::Until(left, right) => write!(f, "until({left}, {right})"),
            Formula::Obligation(inner) => write!(f, "obligation({inner})"),
            Formula::Permission(inner) => write!(f, "permission({inner})"),
            Formula::Forbidden(inner) => write!(f, "forbidden({inner})"),
        }
    }
}
