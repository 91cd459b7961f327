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
use tracing::debug;
use vigil_contracts::{
    ConversationMessage, GovernanceError, GovernanceResult, MessageMetadata, MessageRole,
};

/// Per-state values that are read by predicates but not carried forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMetadata {
    pub role: MessageRole,
    pub ethical_override: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critic_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub index: usize,
    pub cart_value: f64,
    pub sentiment: f64,
    pub persuasion_level: f64,
    pub risk_score: f64,
    pub has_citation: bool,
    pub is_escalated: bool,
    pub metadata: StateMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceAction {
    pub state_index: usize,
    pub name: String,
}

/// Ordered states of one conversation. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionTrace {
    states: Vec<State>,
    actions: Vec<TraceAction>,
}

impl ExecutionTrace {
    pub fn new(
        states: Vec<State>,
        actions: Vec<TraceAction>,
        max_states: usize,
    ) -> GovernanceResult<Self> {
        if states.is_empty() {
            return Err(GovernanceError::EmptyTrace);
        }
        if states.len() > max_states {
            return Err(GovernanceError::TraceTooLong {
                len: states.len(),
                max: max_states,
            });
        }
        if let Some((position, state)) = states
            .iter()
            .enumerate()
            .find(|(position, state)| state.index != *position)
        {
            return Err(GovernanceError::NonContiguousTrace {
                position,
                index: state.index,
            });
        }
        Ok(Self { states, actions })
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn actions(&self) -> &[TraceAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always false; a trace holds at least one state.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&State> {
        self.states.get(index)
    }

    pub fn last(&self) -> &State {
        &self.states[self.states.len() - 1]
    }
}

#[derive(Debug, Clone, Default)]
struct RunningValues {
    cart_value: f64,
    sentiment: f64,
    persuasion_level: f64,
    risk_score: f64,
    has_citation: bool,
    is_escalated: bool,
}

impl RunningValues {
    fn absorb_assistant(&mut self, metadata: &MessageMetadata) {
        if let Some(cart) = metadata.cart_value {
            self.cart_value = cart.max(0.0);
        }
        if let Some(persuasion) = metadata.persuasion_level {
            self.persuasion_level = persuasion.clamp(0.0, 1.0);
        }
        if let Some(risk) = metadata.risk_score {
            self.risk_score = risk.clamp(0.0, 1.0);
        }
        if let Some(citation) = metadata.has_citation {
            self.has_citation = citation;
        }
        if let Some(escalated) = metadata.is_escalated {
            self.is_escalated = escalated;
        }
    }

    fn snapshot(&self, index: usize, message: &ConversationMessage) -> State {
        State {
            index,
            cart_value: self.cart_value,
            sentiment: self.sentiment,
            persuasion_level: self.persuasion_level,
            risk_score: self.risk_score,
            has_citation: self.has_citation,
            is_escalated: self.is_escalated,
            metadata: StateMetadata {
                role: message.role,
                ethical_override: message.metadata.ethical_override.unwrap_or(false),
                critic_confidence: message.metadata.critic_confidence,
            },
        }
    }
}

/// Folds a message history into an [`ExecutionTrace`].
///
/// Every observable value is carried forward from the previous state unless
/// the message overrides it. Sentiment is read from any message; cart value,
/// persuasion, risk, citation and escalation only change on assistant
/// messages, which are also the only ones that record an action. When the
/// history is longer than `max_states` the oldest states are dropped after the
/// fold, so carried values still reflect the full history.
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    max_states: usize,
}

impl TraceBuilder {
    pub fn new(max_states: usize) -> Self {
        Self {
            max_states: max_states.max(1),
        }
    }

    pub fn build(&self, messages: &[ConversationMessage]) -> GovernanceResult<ExecutionTrace> {
        if messages.is_empty() {
            let initial = RunningValues::default()
                .snapshot(0, &ConversationMessage::new(MessageRole::System, ""));
            return ExecutionTrace::new(vec![initial], Vec::new(), self.max_states);
        }

        let mut running = RunningValues::default();
        let mut states = Vec::with_capacity(messages.len());
        let mut actions = Vec::new();

        for (index, message) in messages.iter().enumerate() {
            if let Some(sentiment) = message.metadata.sentiment {
                running.sentiment = sentiment.clamp(-1.0, 1.0);
            }
            if message.role.is_assistant() {
                running.absorb_assistant(&message.metadata);
                actions.push(TraceAction {
                    state_index: index,
                    name: message
                        .metadata
                        .action
                        .clone()
                        .unwrap_or_else(|| "respond".to_string()),
                });
            }
            states.push(running.snapshot(index, message));
        }

        let dropped = states.len().saturating_sub(self.max_states);
        if dropped > 0 {
            debug!(
                dropped = dropped,
                kept = self.max_states,
                "Trace truncated to most recent states"
            );
            states.drain(..dropped);
            for (position, state) in states.iter_mut().enumerate() {
                state.index = position;
            }
            actions.retain(|action| action.state_index >= dropped);
            for action in &mut actions {
                action.state_index -= dropped;
            }
        }

        ExecutionTrace::new(states, actions, self.max_states)
    }
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new(200)
    }
}
