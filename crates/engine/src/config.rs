//! Deployment configuration.
//!
//! One file carries every table a deployment may change: which roles each
//! organization holds, which roles may invoke each action, the lifecycle
//! graph, and optionally the compliance rule set. Missing sections fall back
//! to the built-in tables.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::access::{default_policy, default_roles, AccessPolicy, AllowedRoles, Role};
use crate::action::Action;
use crate::compliance::{default_rules, Rule};
use crate::error::ConfigError;
use crate::event::EventType;
use crate::lifecycle::{Stage, StageGraph};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    /// MSP id → roles held.
    #[serde(default = "default_roles")]
    pub roles: BTreeMap<String, BTreeSet<Role>>,
    /// Action name → roles allowed to invoke it.
    #[serde(default = "default_policy")]
    pub policy: BTreeMap<String, AllowedRoles>,
    #[serde(default)]
    pub lifecycle: StageGraph,
    /// Rules used when a compliance query supplies none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<Vec<Rule>>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        DeploymentConfig {
            roles: default_roles(),
            policy: default_policy(),
            lifecycle: StageGraph::default(),
            compliance: None,
        }
    }
}

impl DeploymentConfig {
    /// Load from a `.toml` or `.json` file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let parse: fn(&str, String) -> Result<Self, ConfigError> = match ext.as_deref() {
            Some("toml") => Self::parse_toml,
            Some("json") => Self::parse_json,
            _ => return Err(ConfigError::UnsupportedFormat { path: display }),
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        parse(&text, display)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse_toml(text, "<inline>".to_string())
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse_json(text, "<inline>".to_string())
    }

    fn parse_toml(text: &str, path: String) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Toml { path, source })
    }

    fn parse_json(text: &str, path: String) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Json { path, source })
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.roles.clone(), self.policy.clone())
    }

    pub fn stage_graph(&self) -> StageGraph {
        self.lifecycle.clone()
    }

    /// Configured rules, or the built-in set.
    pub fn compliance_rules(&self) -> Vec<Rule> {
        self.compliance.clone().unwrap_or_else(default_rules)
    }

    /// Problems that do not stop the configuration from loading but leave
    /// part of the deployment unusable.
    pub fn check(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let known: BTreeSet<&str> = Action::ALL.iter().map(Action::as_str).collect();
        for name in self.policy.keys() {
            if !known.contains(name.as_str()) {
                warnings.push(format!("policy entry for unknown action '{name}'"));
            }
        }
        for action in Action::ALL {
            if !self.policy.contains_key(action.as_str()) {
                warnings.push(format!(
                    "action {action} has no policy entry and is denied to everyone"
                ));
            }
        }

        let held: BTreeSet<&Role> = self.roles.values().flatten().collect();
        for (action, allowed) in &self.policy {
            if let AllowedRoles::Roles(roles) = allowed {
                for role in roles.iter().filter(|r| !held.contains(r)) {
                    warnings.push(format!(
                        "role {role} allowed to invoke {action} is held by no organization"
                    ));
                }
            }
        }

        let initial = Stage::initial();
        let reachable = self.lifecycle.reachable_from(&initial);
        for event_type in EventType::ALL {
            let target = event_type.target_stage();
            if !reachable.contains(&target) {
                warnings.push(format!(
                    "stage {target} (reached by {event_type}) is unreachable from {initial}"
                ));
            }
        }

        warnings
    }
}
