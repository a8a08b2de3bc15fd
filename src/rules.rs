use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AmountConfig, RulesConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GoodsId(usize);

impl GoodsId {
    pub fn raw(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingTypeId(usize);

impl BuildingTypeId {
    pub fn raw(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExpertId(usize);

impl ExpertId {
    pub fn raw(self) -> usize {
        self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("goods type '{0}' defined more than once")]
    DuplicateGoods(String),
    #[error("building type '{0}' defined more than once")]
    DuplicateBuilding(String),
    #[error("expert type '{0}' defined more than once")]
    DuplicateExpert(String),
    #[error("{context} references unknown goods type '{name}'")]
    UnknownGoods { name: String, context: String },
    #[error("{context} references unknown building type '{name}'")]
    UnknownBuilding { name: String, context: String },
    #[error("building type '{0}' cannot upgrade to itself")]
    SelfUpgrade(String),
    #[error("building type '{0}' has a recipe without outputs")]
    InvalidRecipe(String),
    #[error("ruleset must define at least one goods type")]
    NoGoods,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsAmount {
    pub goods: GoodsId,
    pub amount: u32,
}

impl GoodsAmount {
    pub fn new(goods: GoodsId, amount: u32) -> Self {
        Self { goods, amount }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GoodsType {
    pub id: GoodsId,
    pub name: String,
    pub storable: bool,
    pub food: bool,
    pub building_material: bool,
    pub breedable: bool,
}

impl GoodsType {
    pub fn is_unstorable_building_material(&self) -> bool {
        self.building_material && !self.storable
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub inputs: Vec<GoodsAmount>,
    pub outputs: Vec<GoodsAmount>,
}

impl Recipe {
    /// The input consumed in the largest amount. Earlier inputs win ties.
    pub fn dominant_input(&self) -> Option<GoodsAmount> {
        self.inputs.iter().fold(None, |best, input| match best {
            Some(current) if current.amount >= input.amount => Some(current),
            _ => Some(*input),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingType {
    pub id: BuildingTypeId,
    pub name: String,
    pub workplaces: u32,
    pub recipes: Vec<Recipe>,
    pub upgrade: Option<BuildingTypeId>,
}

impl BuildingType {
    pub fn primary_recipe(&self) -> Option<&Recipe> {
        self.recipes.first()
    }

    pub fn produces(&self) -> Option<GoodsId> {
        self.primary_recipe()
            .and_then(|recipe| recipe.outputs.first())
            .map(|output| output.goods)
    }

    /// Terminal building types sit at the top of their upgrade chain.
    pub fn is_terminal(&self) -> bool {
        self.upgrade.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpertType {
    pub id: ExpertId,
    pub name: String,
    pub expert_for: GoodsId,
}

/// Immutable rule data shared by every plan built against it.
///
/// Ids are dense indices into the ruleset's own tables, so a handle is only
/// meaningful together with the ruleset that issued it.
#[derive(Debug, Clone, Serialize)]
pub struct Ruleset {
    goods: Vec<GoodsType>,
    #[serde(skip)]
    goods_index: HashMap<String, GoodsId>,
    buildings: Vec<BuildingType>,
    experts: Vec<ExpertType>,
    food_per_worker: u32,
    expert_factor: u32,
}

impl Ruleset {
    pub fn from_config(config: &RulesConfig) -> Result<Self, RulesError> {
        if config.goods.is_empty() {
            return Err(RulesError::NoGoods);
        }

        let mut goods = Vec::with_capacity(config.goods.len());
        let mut goods_index: HashMap<String, GoodsId> = HashMap::new();
        for (index, entry) in config.goods.iter().enumerate() {
            let id = GoodsId(index);
            if goods_index.insert(entry.id.clone(), id).is_some() {
                return Err(RulesError::DuplicateGoods(entry.id.clone()));
            }
            goods.push(GoodsType {
                id,
                name: entry.id.clone(),
                storable: entry.storable,
                food: entry.food,
                building_material: entry.building_material,
                breedable: entry.breedable,
            });
        }

        let mut building_index: HashMap<&str, BuildingTypeId> = HashMap::new();
        for (index, entry) in config.buildings.iter().enumerate() {
            if building_index
                .insert(entry.id.as_str(), BuildingTypeId(index))
                .is_some()
            {
                return Err(RulesError::DuplicateBuilding(entry.id.clone()));
            }
        }

        let mut buildings = Vec::with_capacity(config.buildings.len());
        for (index, entry) in config.buildings.iter().enumerate() {
            let context = format!("building type '{}'", entry.id);
            let upgrade = match &entry.upgrade {
                Some(name) if name == &entry.id => {
                    return Err(RulesError::SelfUpgrade(entry.id.clone()))
                }
                Some(name) => Some(*building_index.get(name.as_str()).ok_or_else(|| {
                    RulesError::UnknownBuilding {
                        name: name.clone(),
                        context: context.clone(),
                    }
                })?),
                None => None,
            };
            let mut recipes = Vec::with_capacity(entry.recipes.len());
            for recipe in &entry.recipes {
                if recipe.outputs.is_empty() {
                    return Err(RulesError::InvalidRecipe(entry.id.clone()));
                }
                recipes.push(Recipe {
                    inputs: resolve_amounts(&recipe.inputs, &goods_index, &context)?,
                    outputs: resolve_amounts(&recipe.outputs, &goods_index, &context)?,
                });
            }
            buildings.push(BuildingType {
                id: BuildingTypeId(index),
                name: entry.id.clone(),
                workplaces: entry.workplaces,
                recipes,
                upgrade,
            });
        }

        let mut experts = Vec::with_capacity(config.experts.len());
        let mut expert_names: HashSet<&str> = HashSet::new();
        for (index, entry) in config.experts.iter().enumerate() {
            if !expert_names.insert(entry.id.as_str()) {
                return Err(RulesError::DuplicateExpert(entry.id.clone()));
            }
            let expert_for = resolve_goods(
                &entry.goods,
                &goods_index,
                &format!("expert type '{}'", entry.id),
            )?;
            experts.push(ExpertType {
                id: ExpertId(index),
                name: entry.id.clone(),
                expert_for,
            });
        }

        Ok(Self {
            goods,
            goods_index,
            buildings,
            experts,
            food_per_worker: config.food_per_worker,
            expert_factor: config.expert_factor.max(1),
        })
    }

    pub fn goods(&self, id: GoodsId) -> &GoodsType {
        &self.goods[id.0]
    }

    pub fn goods_by_name(&self, name: &str) -> Option<GoodsId> {
        self.goods_index.get(name).copied()
    }

    pub fn building(&self, id: BuildingTypeId) -> &BuildingType {
        &self.buildings[id.0]
    }

    pub fn building_types(&self) -> &[BuildingType] {
        &self.buildings
    }

    pub fn building_by_name(&self, name: &str) -> Option<BuildingTypeId> {
        self.buildings.iter().find(|b| b.name == name).map(|b| b.id)
    }

    pub fn expert(&self, id: ExpertId) -> &ExpertType {
        &self.experts[id.0]
    }

    /// First expert type specialised in `goods`, if the ruleset has one.
    pub fn expert_for(&self, goods: GoodsId) -> Option<ExpertId> {
        self.experts
            .iter()
            .find(|expert| expert.expert_for == goods)
            .map(|expert| expert.id)
    }

    pub fn is_food(&self, goods: GoodsId) -> bool {
        self.goods(goods).food
    }

    pub fn food_per_worker(&self) -> u32 {
        self.food_per_worker
    }

    pub fn expert_factor(&self) -> u32 {
        self.expert_factor
    }

    /// Goods no building recipe produces; these only come from tiles.
    pub fn raw_goods(&self) -> Vec<GoodsId> {
        self.goods
            .iter()
            .map(|g| g.id)
            .filter(|id| {
                !self.buildings.iter().any(|b| {
                    b.recipes
                        .iter()
                        .any(|r| r.outputs.iter().any(|o| o.goods == *id))
                })
            })
            .collect()
    }

    pub fn resolve_goods(&self, name: &str, context: &str) -> Result<GoodsId, RulesError> {
        resolve_goods(name, &self.goods_index, context)
    }

    pub fn resolve_amounts(
        &self,
        amounts: &[AmountConfig],
        context: &str,
    ) -> Result<Vec<GoodsAmount>, RulesError> {
        resolve_amounts(amounts, &self.goods_index, context)
    }
}

fn resolve_goods(
    name: &str,
    index: &HashMap<String, GoodsId>,
    context: &str,
) -> Result<GoodsId, RulesError> {
    index
        .get(name)
        .copied()
        .ok_or_else(|| RulesError::UnknownGoods {
            name: name.to_string(),
            context: context.to_string(),
        })
}

fn resolve_amounts(
    amounts: &[AmountConfig],
    index: &HashMap<String, GoodsId>,
    context: &str,
) -> Result<Vec<GoodsAmount>, RulesError> {
    amounts
        .iter()
        .map(|entry| {
            Ok(GoodsAmount::new(
                resolve_goods(&entry.goods, index, context)?,
                entry.amount,
            ))
        })
        .collect()
}
