//! Policy configuration loading

use commentguard_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::decision::{DecisionPolicy, Thresholds};

/// Tunable policy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Decision band boundaries
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl PolicyConfig {
    /// Load a policy from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid policy YAML: {}", e)))?;
        config.thresholds.validate()?;
        Ok(config)
    }

    /// Load a policy from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Build the decision policy
    pub fn build(&self) -> Result<DecisionPolicy> {
        DecisionPolicy::new(self.thresholds)
    }
}
