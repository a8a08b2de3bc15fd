//! Production calculation for buildings.
//!
//! The planner never does building arithmetic itself. It hands a building,
//! its worker plans and a stock context to a [`ProductionCalculator`] and
//! reads back realized and maximum amounts. Game-specific modifiers belong in
//! alternative implementations of the trait; [`RecipeProductionCalculator`]
//! only applies recipes, the expert factor and the warehouse ceiling.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::plan::{WorkerPlan, WorkerType};
use crate::rules::{BuildingType, GoodsId, Recipe, Ruleset};

pub type GoodsTally = BTreeMap<GoodsId, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Turn(pub u32);

/// Colony-wide supply seen by a building: per-turn net supply of each goods
/// type and what is already held in the warehouse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockContext {
    pub available: GoodsTally,
    pub stored: GoodsTally,
}

impl StockContext {
    pub fn with_available(available: GoodsTally) -> Self {
        Self {
            available,
            stored: GoodsTally::new(),
        }
    }

    pub fn available(&self, goods: GoodsId) -> u32 {
        self.available.get(&goods).copied().unwrap_or(0)
    }

    pub fn stored(&self, goods: GoodsId) -> u32 {
        self.stored.get(&goods).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductionInfo {
    pub production: GoodsTally,
    pub consumption: GoodsTally,
    /// Output of the given workers if inputs and storage were unlimited.
    pub maximum_production: GoodsTally,
    pub maximum_consumption: GoodsTally,
    /// Output with every workplace filled by an expert, unconstrained.
    pub full_staffing_production: GoodsTally,
    pub full_staffing_consumption: GoodsTally,
}

impl ProductionInfo {
    pub fn maximum_consumed(&self, goods: GoodsId) -> u32 {
        self.maximum_consumption.get(&goods).copied().unwrap_or(0)
    }
}

pub trait ProductionCalculator: Send + Sync {
    fn calculate(
        &self,
        rules: &Ruleset,
        building: &BuildingType,
        turn: Turn,
        workers: &[WorkerPlan],
        stock: &StockContext,
        stock_ceiling: u32,
    ) -> ProductionInfo;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecipeProductionCalculator;

impl RecipeProductionCalculator {
    pub fn new() -> Self {
        Self
    }

    fn work_units(rules: &Ruleset, worker: &WorkerPlan, output: Option<GoodsId>) -> u32 {
        match worker.worker {
            WorkerType::Expert(expert) if Some(rules.expert(expert).expert_for) == output => {
                rules.expert_factor()
            }
            _ => 1,
        }
    }
}

impl ProductionCalculator for RecipeProductionCalculator {
    fn calculate(
        &self,
        rules: &Ruleset,
        building: &BuildingType,
        _turn: Turn,
        workers: &[WorkerPlan],
        stock: &StockContext,
        stock_ceiling: u32,
    ) -> ProductionInfo {
        let Some(recipe) = building.primary_recipe() else {
            return ProductionInfo::default();
        };
        let output = building.produces();

        let units: u32 = workers
            .iter()
            .filter(|worker| worker.building == building.id)
            .map(|worker| Self::work_units(rules, worker, output))
            .fold(0, u32::saturating_add);
        let full_units = building.workplaces.saturating_mul(rules.expert_factor());

        let mut realized = units;
        for input in recipe.inputs.iter().filter(|input| input.amount > 0) {
            realized = realized.min(stock.available(input.goods) / input.amount);
        }
        for out in recipe.outputs.iter().filter(|out| out.amount > 0) {
            if rules.goods(out.goods).storable {
                let room = stock_ceiling.saturating_sub(stock.stored(out.goods));
                realized = realized.min(room / out.amount);
            }
        }

        let (maximum_production, maximum_consumption) = scale(recipe, units);
        let (full_staffing_production, full_staffing_consumption) = scale(recipe, full_units);
        let (production, consumption) = scale(recipe, realized);
        ProductionInfo {
            production,
            consumption,
            maximum_production,
            maximum_consumption,
            full_staffing_production,
            full_staffing_consumption,
        }
    }
}

fn scale(recipe: &Recipe, units: u32) -> (GoodsTally, GoodsTally) {
    let mut produced = GoodsTally::new();
    let mut consumed = GoodsTally::new();
    if units == 0 {
        return (produced, consumed);
    }
    for out in &recipe.outputs {
        let total = produced.entry(out.goods).or_insert(0);
        *total = total.saturating_add(out.amount.saturating_mul(units));
    }
    for input in &recipe.inputs {
        let total = consumed.entry(input.goods).or_insert(0);
        *total = total.saturating_add(input.amount.saturating_mul(units));
    }
    (produced, consumed)
}
