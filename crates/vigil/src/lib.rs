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

pub mod affective;
pub mod config;
pub mod critics;
pub mod logging;
pub mod orchestrator;
pub mod policy;
pub mod trace;

pub use affective::{AffectiveState, AffectiveTracker, FeatureVector, SituationalContext};
pub use config::GovernanceConfig;
pub use critics::{CriticContext, MasterCritic, MasterCriticResult};
pub use logging::{GovernanceEvent, GovernanceSink, RecordingSink, SharedSink, TracingSink};
pub use orchestrator::{CandidateResponse, Decision, DecisionOrchestrator, DecisionRequest};
pub use policy::{EthicalPolicy, Formula, ModelChecker, PolicyLoader, PolicyRegistry, Predicate};
pub use trace::{ExecutionTrace, State, TraceBuilder};

pub use vigil_contracts::{
    ConversationMessage, GovernanceError, GovernanceResult, MessageMetadata, MessageRole,
    ResponseSource, Severity, Verdict,
};
