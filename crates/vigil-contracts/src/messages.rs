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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Customer,
    Assistant,
    System,
}

impl MessageRole {
    pub fn is_assistant(&self) -> bool {
        matches!(self, MessageRole::Assistant)
    }
}

/// Observable values attached to a single message. Every field is optional:
/// `None` means "carry the last known value forward".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persuasion_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_citation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_escalated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critic_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethical_override: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl MessageMetadata {
    /// Fills every unset field of `self` from `other`. Values already present
    /// on `self` win.
    pub fn merge_missing(&mut self, other: &MessageMetadata) {
        self.cart_value = self.cart_value.or(other.cart_value);
        self.sentiment = self.sentiment.or(other.sentiment);
        self.persuasion_level = self.persuasion_level.or(other.persuasion_level);
        self.risk_score = self.risk_score.or(other.risk_score);
        self.has_citation = self.has_citation.or(other.has_citation);
        self.is_escalated = self.is_escalated.or(other.is_escalated);
        self.critic_confidence = self.critic_confidence.or(other.critic_confidence);
        self.ethical_override = self.ethical_override.or(other.ethical_override);
        if self.action.is_none() {
            self.action = other.action.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: MessageMetadata::default(),
        }
    }

    pub fn customer(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Customer, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}
