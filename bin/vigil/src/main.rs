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

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vigil::config::GovernanceConfig;
use vigil::logging::tracing_sink;
use vigil::policy::{PolicyLoader, PolicyRegistry};
use vigil::{ConversationMessage, DecisionOrchestrator, DecisionRequest};

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Govern one candidate response. Reads a JSON decision request.
    Decide {
        /// Request file; stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Check a JSON message history against every enabled policy.
    Verify {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// List the policies in effect for the tenant.
    Policies,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "vigil")]
#[command(about = "Affective, critic and policy governance for sales assistant responses")]
struct Cli {
    #[arg(long, default_value_t = false)]
    debug: bool,
    /// TOML configuration; falls back to VIGIL_CONFIG, then config/governance.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    /// YAML tenant policy file; falls back to VIGIL_POLICIES, then the built-in library.
    #[arg(long)]
    policies: Option<PathBuf>,
    /// Compact instead of pretty JSON output.
    #[arg(long, default_value_t = false)]
    compact: bool,
    #[command(subcommand)]
    command: Commands,
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn load_config(explicit: Option<PathBuf>) -> Result<GovernanceConfig> {
    match explicit.or_else(|| env_path("VIGIL_CONFIG")) {
        Some(path) => GovernanceConfig::load_from_file(&path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(GovernanceConfig::load_or_default()),
    }
}

async fn load_registry(
    explicit: Option<PathBuf>,
    config: &GovernanceConfig,
) -> Result<(String, PolicyRegistry)> {
    let depth = config.checker.max_formula_depth;
    match explicit.or_else(|| env_path("VIGIL_POLICIES")) {
        Some(path) => {
            let loaded = PolicyLoader::load_from_file(&path, depth).await?;
            Ok((loaded.tenant, loaded.registry))
        }
        None => Ok(("default".to_string(), PolicyRegistry::with_defaults(depth)?)),
    }
}

async fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            Ok(buffer)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args = Cli::parse();

    let filter = if args.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("warn,vigil=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(args.config)?;
    let (tenant, registry) = load_registry(args.policies, &config).await?;
    info!("Governing for tenant '{}' with {} policies", tenant, registry.len());

    match args.command {
        Commands::Decide { input } => {
            let raw = read_input(input.as_deref()).await?;
            let request: DecisionRequest =
                serde_json::from_str(&raw).context("parsing decision request")?;
            let orchestrator = DecisionOrchestrator::new(&config, registry, tracing_sink());
            let decision = orchestrator.decide(&request);
            print_json(&decision, args.compact)?;
        }
        Commands::Verify { input } => {
            let raw = read_input(input.as_deref()).await?;
            let history: Vec<ConversationMessage> =
                serde_json::from_str(&raw).context("parsing message history")?;
            let orchestrator = DecisionOrchestrator::new(&config, registry, tracing_sink());
            let report = orchestrator.verify_history(&history)?;
            print_json(&report, args.compact)?;
        }
        Commands::Policies => {
            let policies: BTreeMap<_, _> = registry.summary().into_iter().collect();
            print_json(
                &json!({
                    "tenant": tenant,
                    "policies": policies,
                }),
                args.compact,
            )?;
        }
    }

    Ok(())
}
