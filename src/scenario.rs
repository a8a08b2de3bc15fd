use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    config::{LoggingConfig, PlannerConfig, RulesConfig, SiteConfig},
    rules::{Ruleset, RulesError},
    site::ColonySite,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub rules: RulesConfig,
    #[serde(default)]
    pub colony: Option<SiteConfig>,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn build_ruleset(&self) -> Result<Ruleset, RulesError> {
        Ruleset::from_config(&self.rules)
    }

    /// The scenario's own colony, if it defines one.
    pub fn build_site(&self, rules: &Ruleset) -> Result<Option<ColonySite>, RulesError> {
        self.colony
            .as_ref()
            .map(|colony| ColonySite::from_config(colony, rules))
            .transpose()
    }
}
