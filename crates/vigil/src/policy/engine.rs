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

use crate::affective::FRUSTRATION_THRESHOLD;
use crate::config::{CheckerConfig, CounterexampleMode};
use crate::logging::{GovernanceEvent, GovernanceSink, SharedSink};
use crate::policy::ast::{Formula, Predicate};
use crate::policy::registry::{EthicalPolicy, PolicyRegistry};
use crate::trace::{ExecutionTrace, State};
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::debug;
use vigil_contracts::Severity;

/// Where and why a policy failed on a trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counterexample {
    pub state_index: usize,
    pub reason: String,
    /// Text form of the sub-formula that failed at `state_index`.
    pub clause: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub policy_id: String,
    pub severity: Severity,
    pub satisfied: bool,
    pub counterexample: Option<Counterexample>,
    /// Distinct trace states at which a predicate was read.
    pub states_checked: usize,
    pub elapsed: Duration,
}

impl VerificationResult {
    pub fn is_critical_violation(&self) -> bool {
        !self.satisfied && self.severity == Severity::Critical
    }
}

// Timing differs between runs; everything else must not.
impl PartialEq for VerificationResult {
    fn eq(&self, other: &Self) -> bool {
        self.policy_id == other.policy_id
            && self.severity == other.severity
            && self.satisfied == other.satisfied
            && self.counterexample == other.counterexample
            && self.states_checked == other.states_checked
    }
}

/// Bounded-trace model checker. Stateless between calls, so one instance can
/// serve any number of conversations concurrently.
pub struct ModelChecker {
    sink: SharedSink,
    counterexample_mode: CounterexampleMode,
    max_formula_depth: usize,
}

impl ModelChecker {
    pub fn new(sink: SharedSink) -> Self {
        let defaults = CheckerConfig::default();
        Self {
            sink,
            counterexample_mode: defaults.counterexample_mode,
            max_formula_depth: defaults.max_formula_depth,
        }
    }

    pub fn with_counterexample_mode(mut self, mode: CounterexampleMode) -> Self {
        self.counterexample_mode = mode;
        self
    }

    /// Formulas deeper than this are never walked and count as failing, even
    /// when they did not come through a [`PolicyRegistry`].
    pub fn with_max_formula_depth(mut self, max_formula_depth: usize) -> Self {
        self.max_formula_depth = max_formula_depth;
        self
    }

    /// Truth of `formula` at `index`. Indices past the end of the trace are false.
    pub fn evaluate(&self, formula: &Formula, trace: &ExecutionTrace, index: usize) -> bool {
        if index >= trace.len() || self.depth_violation(formula).is_some() {
            return false;
        }
        Evaluation::new(trace, self.sink.as_ref()).holds(formula, index)
    }

    pub fn verify_policy(
        &self,
        policy: &EthicalPolicy,
        trace: &ExecutionTrace,
    ) -> VerificationResult {
        let started = Instant::now();
        let mut evaluation = Evaluation::new(trace, self.sink.as_ref());

        let (satisfied, counterexample) = match self.depth_violation(&policy.formula) {
            Some(rejected) => (false, Some(rejected)),
            None if evaluation.holds(&policy.formula, 0) => (true, None),
            None => (
                false,
                Some(match self.counterexample_mode {
                    CounterexampleMode::Localised => evaluation.locate(&policy.formula, 0),
                    CounterexampleMode::WholeFormulaRescan => evaluation.rescan(&policy.formula),
                }),
            ),
        };
        let states_checked = evaluation.visited.len();

        debug!(
            policy_id = %policy.id,
            satisfied = satisfied,
            states_checked = states_checked,
            "Verified policy"
        );

        if let Some(counterexample) = &counterexample {
            self.sink.record(GovernanceEvent::PolicyViolated {
                policy_id: policy.id.clone(),
                severity: policy.severity,
                state_index: counterexample.state_index,
            });
        }

        VerificationResult {
            policy_id: policy.id.clone(),
            severity: policy.severity,
            satisfied,
            counterexample,
            states_checked,
            elapsed: started.elapsed(),
        }
    }

    /// Results for every enabled policy, in registry order.
    pub fn verify_all(
        &self,
        trace: &ExecutionTrace,
        registry: &PolicyRegistry,
    ) -> Vec<VerificationResult> {
        registry
            .enabled()
            .map(|policy| self.verify_policy(policy, trace))
            .collect()
    }

    /// True when every enabled critical policy holds.
    pub fn is_safe_trace(&self, trace: &ExecutionTrace, registry: &PolicyRegistry) -> bool {
        registry
            .enabled()
            .filter(|policy| policy.is_critical())
            .all(|policy| {
                self.depth_violation(&policy.formula).is_none()
                    && Evaluation::new(trace, self.sink.as_ref()).holds(&policy.formula, 0)
            })
    }

    fn depth_violation(&self, formula: &Formula) -> Option<Counterexample> {
        let depth = formula.depth();
        if depth <= self.max_formula_depth {
            return None;
        }
        self.sink.record(GovernanceEvent::FormulaTooDeep {
            depth,
            max: self.max_formula_depth,
        });
        Some(report(
            0,
            formula,
            format!(
                "formula depth {depth} exceeds maximum {}, not evaluated",
                self.max_formula_depth
            ),
        ))
    }
}

struct Evaluation<'a> {
    trace: &'a ExecutionTrace,
    sink: &'a dyn GovernanceSink,
    visited: HashSet<usize>,
    reported_unknown: HashSet<String>,
}

impl<'a> Evaluation<'a> {
    fn new(trace: &'a ExecutionTrace, sink: &'a dyn GovernanceSink) -> Self {
        Self {
            trace,
            sink,
            visited: HashSet::new(),
            reported_unknown: HashSet::new(),
        }
    }

    fn holds(&mut self, formula: &Formula, i: usize) -> bool {
        let trace = self.trace;
        let n = trace.len();
        match formula {
            Formula::Prop(predicate) => match trace.get(i) {
                Some(state) => self.predicate(predicate, state),
                None => false,
            },
            Formula::Not(inner) => !self.holds(inner, i),
            Formula::And(left, right) => self.holds(left, i) && self.holds(right, i),
            Formula::Or(left, right) => self.holds(left, i) || self.holds(right, i),
            Formula::Implies(left, right) => !self.holds(left, i) || self.holds(right, i),
            Formula::Globally(inner) => (i..n).all(|j| self.holds(inner, j)),
            Formula::Finally(inner) => (i..n).any(|j| self.holds(inner, j)),
            Formula::Next(inner) => i + 1 < n && self.holds(inner, i + 1),
            Formula::Until(hold, release) => {
                for j in i..n {
                    if self.holds(release, j) {
                        return true;
                    }
                    if !self.holds(hold, j) {
                        return false;
                    }
                }
                false
            }
            Formula::Obligation(inner) => self.holds(inner, i),
            Formula::Permission(_) => true,
            Formula::Forbidden(inner) => !self.holds(inner, i),
        }
    }

    fn predicate(&mut self, predicate: &Predicate, state: &State) -> bool {
        self.visited.insert(state.index);
        match predicate {
            Predicate::CartValueAbove(threshold) => state.cart_value > *threshold,
            Predicate::CartValueBelow(threshold) => state.cart_value < *threshold,
            Predicate::RiskAbove(threshold) => state.risk_score > *threshold,
            Predicate::PersuasionAbove(threshold) => state.persuasion_level > *threshold,
            Predicate::SentimentBelow(threshold) => state.sentiment < *threshold,
            Predicate::CustomerFrustrated => state.sentiment < FRUSTRATION_THRESHOLD,
            Predicate::HasCitation => state.has_citation,
            Predicate::IsEscalated => state.is_escalated,
            Predicate::EthicalOverride => state.metadata.ethical_override,
            Predicate::AuthoredBy(role) => state.metadata.role == *role,
            Predicate::Unknown(name) => {
                if self.reported_unknown.insert(name.clone()) {
                    self.sink
                        .record(GovernanceEvent::UnknownPredicate { name: name.clone() });
                }
                false
            }
        }
    }

    /// Finds the state where `formula`, known to fail at `i`, actually breaks.
    fn locate(&mut self, formula: &Formula, i: usize) -> Counterexample {
        let n = self.trace.len();
        match formula {
            Formula::Globally(inner) => match (i..n).find(|&j| !self.holds(inner, j)) {
                Some(j) => self.locate(inner, j),
                None => report(i, formula, "does not hold".to_string()),
            },
            Formula::Obligation(inner) => self.locate(inner, i),
            Formula::And(left, right) => {
                if !self.holds(left, i) {
                    self.locate(left, i)
                } else {
                    self.locate(right, i)
                }
            }
            Formula::Implies(left, right) => {
                let mut found = self.locate(right, i);
                found.reason = format!("{left} holds at state {i}, but {}", found.reason);
                found
            }
            Formula::Next(inner) => {
                if i + 1 < n {
                    self.locate(inner, i + 1)
                } else {
                    report(i, formula, "there is no next state".to_string())
                }
            }
            Formula::Until(hold, release) => {
                for j in i..n {
                    if self.holds(release, j) {
                        break;
                    }
                    if !self.holds(hold, j) {
                        return report(
                            j,
                            formula,
                            format!("{hold} stopped holding before {release}"),
                        );
                    }
                }
                report(
                    n.saturating_sub(1),
                    formula,
                    format!("trace ended before {release} held"),
                )
            }
            Formula::Finally(inner) => {
                report(i, formula, format!("{inner} never holds from state {i} onwards"))
            }
            Formula::Forbidden(inner) => report(i, formula, format!("forbidden {inner} holds")),
            Formula::Not(inner) => report(i, formula, format!("{inner} holds")),
            Formula::Or(_, _) => report(i, formula, "neither side holds".to_string()),
            Formula::Prop(predicate) => report(i, formula, format!("{predicate} does not hold")),
            Formula::Permission(_) => report(i, formula, "does not hold".to_string()),
        }
    }

    /// First index at which the whole formula fails.
    fn rescan(&mut self, formula: &Formula) -> Counterexample {
        let n = self.trace.len();
        let index = (0..n).find(|&j| !self.holds(formula, j)).unwrap_or(0);
        report(index, formula, "policy does not hold".to_string())
    }
}

fn report(state_index: usize, clause: &Formula, reason: String) -> Counterexample {
    Counterexample {
        state_index,
        reason,
        clause: clause.to_string(),
    }
}
