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
use std::fmt;
use thiserror::Error;

/// Where a candidate response text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    KnowledgeBase,
    Model,
    AutonomousSales,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Final outcome for one candidate response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Proceed,
    Revise,
    Escalate,
}

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("Stability violation: |persistence| = {persistence_abs} must be < 1")]
    StabilityViolation { persistence_abs: f64 },

    #[error("Non-finite {quantity} ({value})")]
    NonFiniteValue { quantity: &'static str, value: f64 },

    #[error("Formula depth {depth} exceeds maximum {max}")]
    FormulaTooDeep { depth: usize, max: usize },

    #[error("Trace length {len} exceeds maximum {max}")]
    TraceTooLong { len: usize, max: usize },

    #[error("Execution trace must contain at least one state")]
    EmptyTrace,

    #[error("Trace state at position {position} carries index {index}")]
    NonContiguousTrace { position: usize, index: usize },

    #[error("Formula parse error at offset {offset}: {message}")]
    FormulaParse { offset: usize, message: String },

    #[error("Duplicate policy id: {0}")]
    DuplicatePolicy(String),

    #[error("Unknown policy id: {0}")]
    UnknownPolicy(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type GovernanceResult<T> = Result<T, GovernanceError>;

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "info" => Severity::Info,
            "critical" => Severity::Critical,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Proceed => write!(f, "proceed"),
            Verdict::Revise => write!(f, "revise"),
            Verdict::Escalate => write!(f, "escalate"),
        }
    }
}
