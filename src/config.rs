//! Serde-facing configuration for rulesets, colony sites and planner settings.
//!
//! These types mirror the YAML scenario layout one-to-one and carry names
//! rather than ids. `Ruleset::from_config` and `ColonySite::from_config`
//! resolve and validate them.

use serde::{Deserialize, Serialize};

use crate::pipeline::PlannerSettings;
use crate::production::Turn;

fn default_turn() -> u32 {
    1
}

fn default_stock_ceiling() -> u32 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_food_per_worker() -> u32 {
    2
}

fn default_expert_factor() -> u32 {
    2
}

fn default_storable() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_turn")]
    pub turn: u32,
    #[serde(default = "default_stock_ceiling")]
    pub stock_ceiling: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            turn: default_turn(),
            stock_ceiling: default_stock_ceiling(),
        }
    }
}

impl PlannerConfig {
    pub fn settings(&self) -> PlannerSettings {
        PlannerSettings {
            turn: Turn(self.turn),
            stock_ceiling: self.stock_ceiling,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_food_per_worker")]
    pub food_per_worker: u32,
    #[serde(default = "default_expert_factor")]
    pub expert_factor: u32,
    pub goods: Vec<GoodsConfig>,
    #[serde(default)]
    pub buildings: Vec<BuildingConfig>,
    #[serde(default)]
    pub experts: Vec<ExpertConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsConfig {
    pub id: String,
    #[serde(default = "default_storable")]
    pub storable: bool,
    #[serde(default)]
    pub food: bool,
    #[serde(default)]
    pub building_material: bool,
    #[serde(default)]
    pub breedable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingConfig {
    pub id: String,
    pub workplaces: u32,
    #[serde(default)]
    pub upgrade: Option<String>,
    #[serde(default)]
    pub recipes: Vec<RecipeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeConfig {
    #[serde(default)]
    pub inputs: Vec<AmountConfig>,
    pub outputs: Vec<AmountConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountConfig {
    pub goods: String,
    pub amount: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertConfig {
    pub id: String,
    pub goods: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub center: Vec<AmountConfig>,
    #[serde(default)]
    pub tiles: Vec<TileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileConfig {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub potential: Vec<AmountConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planner_defaults_apply_when_section_is_sparse() {
        let config: PlannerConfig = serde_yaml::from_str("turn: 7").unwrap();
        assert_eq!(config.turn, 7);
        assert_eq!(config.stock_ceiling, 100);
        assert_eq!(config.settings().turn, Turn(7));
    }

    #[test]
    fn goods_are_storable_unless_stated_otherwise() {
        let goods: Vec<GoodsConfig> = serde_yaml::from_str(
            "- id: lumber\n- id: hammers\n  storable: false\n  building_material: true\n",
        )
        .unwrap();
        assert!(goods[0].storable);
        assert!(!goods[0].building_material);
        assert!(!goods[1].storable);
        assert!(goods[1].building_material);
    }
}
