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
use crate::policy::registry::EthicalPolicy;
use vigil_contracts::Severity;

pub const RISK_ESCALATION: &str = "risk_escalation";
pub const KB_CITATION: &str = "kb_citation";
pub const PERSUASION_LIMIT: &str = "persuasion_limit";
pub const FRUSTRATION_ESCALATION: &str = "frustration_escalation";
pub const HIGH_VALUE_APPROVAL: &str = "high_value_approval";

fn prop(predicate: Predicate) -> Formula {
    Formula::prop(predicate)
}

/// High risk must always be escalated.
pub fn risk_escalation() -> EthicalPolicy {
    EthicalPolicy::new(
        RISK_ESCALATION,
        "High-risk conversations are escalated",
        Formula::globally(Formula::implies(
            prop(Predicate::RiskAbove(0.7)),
            Formula::obligation(prop(Predicate::IsEscalated)),
        )),
        Severity::Critical,
    )
}

/// Cited responses must carry a citation. The obligation restates its own
/// antecedent, so this policy holds on every trace; it is kept as a named
/// slot that tenants can replace with a stricter formula.
pub fn kb_citation() -> EthicalPolicy {
    EthicalPolicy::new(
        KB_CITATION,
        "Knowledge-base answers cite their source",
        Formula::globally(Formula::implies(
            prop(Predicate::HasCitation),
            Formula::obligation(prop(Predicate::HasCitation)),
        )),
        Severity::Warning,
    )
}

pub fn persuasion_limit() -> EthicalPolicy {
    EthicalPolicy::new(
        PERSUASION_LIMIT,
        "Persuasion never exceeds 0.7",
        Formula::globally(Formula::forbidden(prop(Predicate::PersuasionAbove(0.7)))),
        Severity::Critical,
    )
}

/// A frustrated customer is eventually handed to a human.
pub fn frustration_escalation() -> EthicalPolicy {
    EthicalPolicy::new(
        FRUSTRATION_ESCALATION,
        "Frustrated customers are eventually escalated",
        Formula::globally(Formula::implies(
            prop(Predicate::CustomerFrustrated),
            Formula::finally(prop(Predicate::IsEscalated)),
        )),
        Severity::Warning,
    )
}

pub fn high_value_approval() -> EthicalPolicy {
    EthicalPolicy::new(
        HIGH_VALUE_APPROVAL,
        "Carts above 5000 need human approval",
        Formula::globally(Formula::implies(
            prop(Predicate::CartValueAbove(5000.0)),
            Formula::obligation(prop(Predicate::IsEscalated)),
        )),
        Severity::Critical,
    )
}

/// The built-in library in registration order.
pub fn default_policies() -> Vec<EthicalPolicy> {
    vec![
        risk_escalation(),
        kb_citation(),
        persuasion_limit(),
        frustration_escalation(),
        high_value_approval(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_library_contents() {
        let policies = default_policies();
        let ids: Vec<&str> = policies.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                RISK_ESCALATION,
                KB_CITATION,
                PERSUASION_LIMIT,
                FRUSTRATION_ESCALATION,
                HIGH_VALUE_APPROVAL
            ]
        );

        let critical: Vec<&str> = policies
            .iter()
            .filter(|p| p.severity == Severity::Critical)
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(
            critical,
            vec![RISK_ESCALATION, PERSUASION_LIMIT, HIGH_VALUE_APPROVAL]
        );
        assert!(policies.iter().all(|p| p.enabled));
    }

    #[test]
    fn test_persuasion_limit_text_form() {
        assert_eq!(
            persuasion_limit().formula.to_string(),
            "globally(forbidden(persuasion > 0.7))"
        );
        assert_eq!(
            frustration_escalation().formula.to_string(),
            "globally(implies(frustrated, finally(escalated)))"
        );
    }
}
