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

use crate::policy::ast::Formula;
use crate::policy::library;
use crate::policy::parser::FormulaParser;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use vigil_contracts::{GovernanceError, GovernanceResult, Severity};

/// A named temporal-deontic rule. The formula is fixed once registered;
/// only `enabled` and `severity` can change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EthicalPolicy {
    pub id: String,
    pub name: String,
    pub formula: Formula,
    pub enabled: bool,
    pub severity: Severity,
}

impl EthicalPolicy {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        formula: Formula,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            formula,
            enabled: true,
            severity,
        }
    }

    /// Builds a policy from the text form accepted by [`FormulaParser`].
    pub fn from_text(
        id: impl Into<String>,
        name: impl Into<String>,
        formula: &str,
        severity: Severity,
        max_formula_depth: usize,
    ) -> GovernanceResult<Self> {
        let formula = FormulaParser::parse(formula, max_formula_depth)?;
        Ok(Self::new(id, name, formula, severity))
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Ordered set of policies for one tenant. Passed explicitly to the checker.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: Vec<EthicalPolicy>,
    max_formula_depth: usize,
}

impl PolicyRegistry {
    pub fn new(max_formula_depth: usize) -> Self {
        Self {
            policies: Vec::new(),
            max_formula_depth,
        }
    }

    pub fn with_defaults(max_formula_depth: usize) -> GovernanceResult<Self> {
        let mut registry = Self::new(max_formula_depth);
        for policy in library::default_policies() {
            registry.register(policy)?;
        }
        info!(
            "✅ Policy registry initialised with {} default policies",
            registry.len()
        );
        Ok(registry)
    }

    pub fn register(&mut self, policy: EthicalPolicy) -> GovernanceResult<()> {
        if self.get(&policy.id).is_some() {
            return Err(GovernanceError::DuplicatePolicy(policy.id));
        }
        let depth = policy.formula.depth();
        if depth > self.max_formula_depth {
            return Err(GovernanceError::FormulaTooDeep {
                depth,
                max: self.max_formula_depth,
            });
        }
        for predicate in policy.formula.predicates() {
            if predicate.is_unknown() {
                warn!(
                    policy_id = %policy.id,
                    predicate = %predicate,
                    "️⚠️ Policy references an unknown predicate and will fail closed"
                );
            }
        }
        debug!(
            policy_id = %policy.id,
            severity = %policy.severity,
            formula = %policy.formula,
            "Registered policy"
        );
        self.policies.push(policy);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&EthicalPolicy> {
        self.policies.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> GovernanceResult<&mut EthicalPolicy> {
        self.policies
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| GovernanceError::UnknownPolicy(id.to_string()))
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> GovernanceResult<()> {
        self.get_mut(id)?.enabled = enabled;
        Ok(())
    }

    pub fn set_severity(&mut self, id: &str, severity: Severity) -> GovernanceResult<()> {
        self.get_mut(id)?.severity = severity;
        Ok(())
    }

    pub fn policies(&self) -> &[EthicalPolicy] {
        &self.policies
    }

    pub fn enabled(&self) -> impl Iterator<Item = &EthicalPolicy> {
        self.policies.iter().filter(|p| p.enabled)
    }

    pub fn max_formula_depth(&self) -> usize {
        self.max_formula_depth
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn summary(&self) -> HashMap<String, Value> {
        let mut summary = HashMap::new();

        for policy in &self.policies {
            summary.insert(
                policy.id.clone(),
                serde_json::json!({
                    "name": policy.name,
                    "formula": policy.formula.to_string(),
                    "enabled": policy.enabled,
                    "severity": policy.severity,
                    "depth": policy.formula.depth()
                }),
            );
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ast::Predicate;

    #[test]
    fn test_with_defaults_registers_library() {
        let registry = PolicyRegistry::with_defaults(64).unwrap();
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.enabled().count(), 5);
        assert!(registry
            .get(library::RISK_ESCALATION)
            .unwrap()
            .is_critical());
    }

    #[test]
    fn test_register_rejects_duplicates_and_deep_formulas() {
        let mut registry = PolicyRegistry::with_defaults(4).unwrap();
        let duplicate = library::kb_citation();
        assert!(matches!(
            registry.register(duplicate),
            Err(GovernanceError::DuplicatePolicy(id)) if id == library::KB_CITATION
        ));

        let deep = EthicalPolicy::new(
            "deep",
            "Too deep",
            Formula::next(Formula::next(Formula::next(Formula::next(Formula::prop(
                Predicate::IsEscalated,
            ))))),
            Severity::Info,
        );
        assert!(matches!(
            registry.register(deep),
            Err(GovernanceError::FormulaTooDeep { depth: 5, max: 4 })
        ));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_defaults_need_depth_four() {
        assert!(matches!(
            PolicyRegistry::with_defaults(3),
            Err(GovernanceError::FormulaTooDeep { depth: 4, max: 3 })
        ));
    }

    #[test]
    fn test_toggle_and_reclassify() {
        let mut registry = PolicyRegistry::with_defaults(64).unwrap();
        registry.set_enabled(library::KB_CITATION, false).unwrap();
        registry
            .set_severity(library::FRUSTRATION_ESCALATION, Severity::Critical)
            .unwrap();

        assert_eq!(registry.enabled().count(), 4);
        assert!(registry
            .get(library::FRUSTRATION_ESCALATION)
            .unwrap()
            .is_critical());
        assert!(matches!(
            registry.set_enabled("missing", true),
            Err(GovernanceError::UnknownPolicy(_))
        ));
    }

    #[test]
    fn test_summary_lists_every_policy() {
        let registry = PolicyRegistry::with_defaults(64).unwrap();
        let summary = registry.summary();
        assert_eq!(summary.len(), 5);
        let entry = &summary[library::PERSUASION_LIMIT];
        assert_eq!(entry["severity"], "critical");
        assert_eq!(entry["formula"], "globally(forbidden(persuasion > 0.7))");
        assert_eq!(entry["depth"], 3);
    }

    #[test]
    fn test_from_text() {
        let policy = EthicalPolicy::from_text(
            "discount_ceiling",
            "Discount ceiling",
            "globally(implies(cart_value > 3000, obligation(escalated)))",
            Severity::Warning,
            64,
        )
        .unwrap();
        assert_eq!(policy.formula.depth(), 4);
        assert!(policy.enabled);
    }
}
