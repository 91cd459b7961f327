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

use std::sync::Arc;
use vigil::logging::{GovernanceEvent, RecordingSink};
use vigil::policy::library;
use vigil::policy::{EthicalPolicy, Formula, FormulaParser, ModelChecker, PolicyRegistry, Predicate};
use vigil::trace::TraceBuilder;
use vigil::{ConversationMessage, ExecutionTrace, MessageMetadata, Severity};

fn assistant(metadata: MessageMetadata) -> ConversationMessage {
    ConversationMessage::assistant("reply").with_metadata(metadata)
}

fn customer(sentiment: f64) -> ConversationMessage {
    ConversationMessage::customer("question").with_metadata(MessageMetadata {
        sentiment: Some(sentiment),
        ..Default::default()
    })
}

fn build(messages: &[ConversationMessage]) -> ExecutionTrace {
    TraceBuilder::default().build(messages).unwrap()
}

fn checker() -> (ModelChecker, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    (ModelChecker::new(sink.clone()), sink)
}

#[test]
fn test_persuasion_limit_counterexample_at_first_state() {
    let (checker, _) = checker();
    let trace = build(&[
        assistant(MessageMetadata {
            persuasion_level: Some(0.9),
            ..Default::default()
        }),
        customer(0.1),
    ]);

    let result = checker.verify_policy(&library::persuasion_limit(), &trace);
    assert!(!result.satisfied);
    let counterexample = result.counterexample.unwrap();
    assert_eq!(counterexample.state_index, 0);
    assert_eq!(counterexample.clause, "forbidden(persuasion > 0.7)");
}

#[test]
fn test_until_holds_when_release_arrives() {
    let (checker, _) = checker();
    let cited = MessageMetadata {
        has_citation: Some(true),
        ..Default::default()
    };
    let trace = build(&[
        assistant(cited.clone()),
        assistant(cited),
        assistant(MessageMetadata {
            is_escalated: Some(true),
            ..Default::default()
        }),
    ]);
    let formula = Formula::until(
        Formula::prop(Predicate::HasCitation),
        Formula::prop(Predicate::IsEscalated),
    );
    assert!(checker.evaluate(&formula, &trace, 0));
}

#[test]
fn test_until_fails_when_release_never_arrives() {
    let (checker, _) = checker();
    let cited = MessageMetadata {
        has_citation: Some(true),
        ..Default::default()
    };
    let trace = build(&[assistant(cited.clone()), assistant(cited.clone()), assistant(cited)]);
    let policy = EthicalPolicy::new(
        "cited_until_escalated",
        "Cite until escalated",
        Formula::until(
            Formula::prop(Predicate::HasCitation),
            Formula::prop(Predicate::IsEscalated),
        ),
        Severity::Info,
    );
    let result = checker.verify_policy(&policy, &trace);
    assert!(!result.satisfied);
    let counterexample = result.counterexample.unwrap();
    assert_eq!(counterexample.state_index, 2);
    assert!(counterexample.reason.contains("trace ended"));
}

#[test]
fn test_verification_is_idempotent() {
    let (checker, _) = checker();
    let trace = build(&[
        customer(-0.8),
        assistant(MessageMetadata {
            cart_value: Some(7200.0),
            risk_score: Some(0.9),
            persuasion_level: Some(0.75),
            ..Default::default()
        }),
        customer(-0.6),
    ]);
    let registry = PolicyRegistry::with_defaults(64).unwrap();

    let first = checker.verify_all(&trace, &registry);
    let second = checker.verify_all(&trace, &registry);
    assert_eq!(first, second);
    assert_eq!(
        checker.is_safe_trace(&trace, &registry),
        checker.is_safe_trace(&trace, &registry)
    );
    assert!(!checker.is_safe_trace(&trace, &registry));
}

#[test]
fn test_escalation_discharges_obligations() {
    let (checker, _) = checker();
    let trace = build(&[
        customer(-0.9),
        assistant(MessageMetadata {
            cart_value: Some(6000.0),
            risk_score: Some(0.8),
            is_escalated: Some(true),
            ..Default::default()
        }),
    ]);
    let registry = PolicyRegistry::with_defaults(64).unwrap();

    let results = checker.verify_all(&trace, &registry);
    assert!(results.iter().all(|r| r.satisfied), "{results:?}");
    assert!(checker.is_safe_trace(&trace, &registry));
}

#[test]
fn test_kb_citation_policy_always_holds() {
    let (checker, _) = checker();
    let trace = build(&[
        assistant(MessageMetadata {
            has_citation: Some(true),
            ..Default::default()
        }),
        assistant(MessageMetadata {
            has_citation: Some(false),
            ..Default::default()
        }),
    ]);
    assert!(checker.verify_policy(&library::kb_citation(), &trace).satisfied);
}

#[test]
fn test_custom_text_policy_with_unknown_predicate_fails_closed() {
    let (checker, sink) = checker();
    let formula = FormulaParser::parse("finally(loyalty_tier > 2)", 64).unwrap();
    let policy = EthicalPolicy::new("loyalty", "Loyalty", formula, Severity::Warning);
    let trace = build(&[customer(0.3), assistant(MessageMetadata::default())]);

    let result = checker.verify_policy(&policy, &trace);
    assert!(!result.satisfied);
    assert_eq!(
        sink.count_where(|e| matches!(
            e,
            GovernanceEvent::UnknownPredicate { name } if name == "loyalty_tier > 2"
        )),
        1
    );
}

#[test]
fn test_authored_by_predicate_reads_message_role() {
    let (checker, _) = checker();
    let trace = build(&[customer(0.0), assistant(MessageMetadata::default())]);
    let formula = FormulaParser::parse(
        "and(authored_by_customer, next(authored_by_assistant))",
        64,
    )
    .unwrap();
    assert!(checker.evaluate(&formula, &trace, 0));
    assert!(!checker.evaluate(&formula, &trace, 1));
}
