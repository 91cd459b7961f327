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

use std::io::Write;
use tempfile::NamedTempFile;
use vigil::policy::library;
use vigil::policy::PolicyLoader;
use vigil::Severity;

#[tokio::test]
async fn test_load_tenant_policy_file() {
    let yaml_content = r#"
tenant: acme-store
include_defaults: true
overrides:
  - id: kb_citation
    enabled: false
  - id: frustration_escalation
    severity: critical
policies:
  - id: discount_ceiling
    name: Discount ceiling
    severity: warning
    formula: "globally(implies(cart_value > 3000, obligation(escalated)))"
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{yaml_content}").unwrap();

    let loaded = PolicyLoader::load_from_file(temp_file.path(), 64)
        .await
        .unwrap();
    assert_eq!(loaded.tenant, "acme-store");
    assert_eq!(loaded.registry.len(), 6);
    assert_eq!(loaded.registry.enabled().count(), 5);
    assert!(!loaded.registry.get(library::KB_CITATION).unwrap().enabled);
    assert_eq!(
        loaded
            .registry
            .get(library::FRUSTRATION_ESCALATION)
            .unwrap()
            .severity,
        Severity::Critical
    );
    assert_eq!(
        loaded.registry.summary()["discount_ceiling"]["name"],
        "Discount ceiling"
    );
}

#[tokio::test]
async fn test_load_rejects_duplicate_ids() {
    let yaml_content = r#"
tenant: acme-store
policies:
  - id: risk_escalation
    formula: "globally(implies(risk > 0.5, obligation(escalated)))"
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{yaml_content}").unwrap();

    let error = PolicyLoader::load_from_file(temp_file.path(), 64)
        .await
        .unwrap_err();
    let error_msg = format!("{error:#}");
    assert!(error_msg.contains("risk_escalation"));
    assert!(error_msg.contains("Duplicate"));
}

#[tokio::test]
async fn test_load_rejects_over_deep_custom_formula() {
    let yaml_content = r#"
tenant: acme-store
include_defaults: false
policies:
  - id: nested
    formula: "next(next(next(next(escalated))))"
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{yaml_content}").unwrap();

    let error = PolicyLoader::load_from_file(temp_file.path(), 3)
        .await
        .unwrap_err();
    assert!(format!("{error:#}").contains("nested"));
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let result = PolicyLoader::load_from_file("does/not/exist.yaml", 64).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_sample_tenant_file_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/policies/default.yaml");
    let loaded = PolicyLoader::load_from_file(path, 64).await.unwrap();
    assert_eq!(loaded.tenant, "default");
    assert_eq!(loaded.registry.len(), 7);
    assert!(!loaded.registry.get("discount_ceiling").unwrap().enabled);
}
