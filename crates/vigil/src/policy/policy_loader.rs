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

use crate::policy::registry::{EthicalPolicy, PolicyRegistry};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};
use vigil_contracts::Severity;

/// YAML layout of a tenant policy file.
///
/// ```yaml
/// tenant: acme
/// include_defaults: true
/// overrides:
///   - id: kb_citation
///     enabled: false
/// policies:
///   - id: discount_ceiling
///     name: Discount ceiling
///     severity: warning
///     formula: "globally(implies(cart_value > 3000, obligation(escalated)))"
/// ```
#[derive(Debug, Deserialize)]
pub struct TenantPolicyConfig {
    pub tenant: String,
    #[serde(default = "default_true")]
    pub include_defaults: bool,
    #[serde(default)]
    pub overrides: Vec<PolicyOverride>,
    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyOverride {
    pub id: String,
    pub enabled: Option<bool>,
    pub severity: Option<Severity>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyDefinition {
    pub id: String,
    pub name: Option<String>,
    pub formula: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_severity() -> Severity {
    Severity::Warning
}

#[derive(Debug)]
pub struct TenantPolicies {
    pub tenant: String,
    pub registry: PolicyRegistry,
}

pub struct PolicyLoader;

impl PolicyLoader {
    pub async fn load_from_file(
        file_path: impl AsRef<Path>,
        max_formula_depth: usize,
    ) -> Result<TenantPolicies> {
        let file_path = file_path.as_ref();
        info!("Loading tenant policies from {}", file_path.display());

        let yaml_content = fs::read_to_string(file_path)
            .await
            .with_context(|| format!("reading {}", file_path.display()))?;
        Self::from_yaml_str(&yaml_content, max_formula_depth)
    }

    pub fn from_yaml_str(yaml_content: &str, max_formula_depth: usize) -> Result<TenantPolicies> {
        let config: TenantPolicyConfig = serde_yaml::from_str(yaml_content)?;

        info!(
            " Tenant '{}': {} overrides and {} custom policies",
            config.tenant,
            config.overrides.len(),
            config.policies.len()
        );

        let registry = Self::build_registry(&config, max_formula_depth)?;
        Self::validate_registry(&config.tenant, &registry);

        Ok(TenantPolicies {
            tenant: config.tenant,
            registry,
        })
    }

    fn build_registry(
        config: &TenantPolicyConfig,
        max_formula_depth: usize,
    ) -> Result<PolicyRegistry> {
        let mut registry = if config.include_defaults {
            PolicyRegistry::with_defaults(max_formula_depth)?
        } else {
            PolicyRegistry::new(max_formula_depth)
        };

        for definition in &config.policies {
            let mut policy = EthicalPolicy::from_text(
                &definition.id,
                definition.name.as_deref().unwrap_or(&definition.id),
                &definition.formula,
                definition.severity,
                max_formula_depth,
            )
            .with_context(|| format!("Invalid formula in policy '{}'", definition.id))?;
            policy.enabled = definition.enabled;
            registry
                .register(policy)
                .with_context(|| format!("Cannot register policy '{}'", definition.id))?;
        }

        for policy_override in &config.overrides {
            if let Some(enabled) = policy_override.enabled {
                registry
                    .set_enabled(&policy_override.id, enabled)
                    .with_context(|| format!("Override for policy '{}'", policy_override.id))?;
            }
            if let Some(severity) = policy_override.severity {
                registry
                    .set_severity(&policy_override.id, severity)
                    .with_context(|| format!("Override for policy '{}'", policy_override.id))?;
            }
        }

        Ok(registry)
    }

    fn validate_registry(tenant: &str, registry: &PolicyRegistry) {
        let mut severity_counts: BTreeMap<Severity, usize> = BTreeMap::new();
        for policy in registry.enabled() {
            *severity_counts.entry(policy.severity).or_insert(0) += 1;
        }

        if !severity_counts.contains_key(&Severity::Critical) {
            warn!(
                "️⚠️ Tenant '{}' has no enabled critical policies - \
                 every trace will be considered safe",
                tenant
            );
        }

        info!("Enabled policy distribution by severity:");
        for (severity, count) in &severity_counts {
            info!("- {}: {} policies", severity, count);
        }
    }
}
