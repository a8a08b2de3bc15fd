use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::production::GoodsTally;
use crate::rules::{BuildingType, BuildingTypeId, ExpertId, GoodsId, Ruleset};
use crate::site::{ColonySite, Tile, TileId};

/// One work tile producing one goods type, worked by the matching expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TilePlan {
    pub tile: TileId,
    pub goods: GoodsId,
}

impl TilePlan {
    pub fn new(tile: TileId, goods: GoodsId) -> Self {
        Self { tile, goods }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkerType {
    Expert(ExpertId),
    FreeColonist,
}

impl WorkerType {
    /// The expert for `goods` when the ruleset has one, a free colonist otherwise.
    pub fn best_for(rules: &Ruleset, goods: GoodsId) -> Self {
        rules
            .expert_for(goods)
            .map(WorkerType::Expert)
            .unwrap_or(WorkerType::FreeColonist)
    }
}

/// One occupied workplace in a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WorkerPlan {
    pub worker: WorkerType,
    pub building: BuildingTypeId,
    pub goods: GoodsId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("tile {0} is not a work tile of this colony")]
    UnknownTile(usize),
    #[error("building type {0} is not part of the ruleset")]
    UnknownBuilding(usize),
    #[error("building '{building}' has no free workplace ({workplaces} in total)")]
    WorkplacesExhausted { building: String, workplaces: u32 },
}

/// Everything one step decided to change. Applied as a unit by
/// [`TentativeColonyPlan::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanChanges {
    pub tile_plans: Vec<TilePlan>,
    pub buildables: Vec<BuildingTypeId>,
    pub worker_plans: Vec<WorkerPlan>,
}

impl PlanChanges {
    pub fn with_tile_plans(tile_plans: Vec<TilePlan>) -> Self {
        Self {
            tile_plans,
            ..Self::default()
        }
    }
}

/// Owned view of a finished plan, ordered for comparison: tile plans by
/// tile, worker plans as added, buildables by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanOutcome {
    pub tile_plans: Vec<TilePlan>,
    pub worker_plans: Vec<WorkerPlan>,
    pub buildables: Vec<BuildingTypeId>,
}

/// Working state of one candidate allocation for a colony site.
#[derive(Debug, Clone)]
pub struct TentativeColonyPlan<'a> {
    rules: &'a Ruleset,
    site: &'a ColonySite,
    tile_plans: BTreeMap<TileId, TilePlan>,
    worker_plans: Vec<WorkerPlan>,
    buildables: BTreeSet<BuildingTypeId>,
}

impl<'a> TentativeColonyPlan<'a> {
    pub fn new(rules: &'a Ruleset, site: &'a ColonySite) -> Self {
        Self {
            rules,
            site,
            tile_plans: BTreeMap::new(),
            worker_plans: Vec::new(),
            buildables: BTreeSet::new(),
        }
    }

    pub fn rules(&self) -> &'a Ruleset {
        self.rules
    }

    pub fn site(&self) -> &'a ColonySite {
        self.site
    }

    pub fn tile_plan(&self, tile: TileId) -> Option<&TilePlan> {
        self.tile_plans.get(&tile)
    }

    pub fn tile_plans(&self) -> impl Iterator<Item = &TilePlan> + '_ {
        self.tile_plans.values()
    }

    pub fn worker_plans(&self) -> &[WorkerPlan] {
        &self.worker_plans
    }

    pub fn buildables(&self) -> impl Iterator<Item = BuildingTypeId> + '_ {
        self.buildables.iter().copied()
    }

    pub fn is_buildable(&self, building: BuildingTypeId) -> bool {
        self.buildables.contains(&building)
    }

    pub fn workers_in(&self, building: BuildingTypeId) -> u32 {
        self.worker_plans
            .iter()
            .filter(|plan| plan.building == building)
            .count() as u32
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Work tiles without a tile plan, in tile order. Reflects the plan at
    /// the time the iterator is advanced.
    pub fn unassigned_work_tiles(&self) -> impl Iterator<Item = &'a Tile> + '_ {
        self.site
            .tiles()
            .iter()
            .filter(move |tile| !self.tile_plans.contains_key(&tile.id))
    }

    pub fn unassigned_except<'s>(
        &'s self,
        reserved: &'s BTreeSet<TileId>,
    ) -> impl Iterator<Item = &'a Tile> + 's {
        self.unassigned_work_tiles()
            .filter(move |tile| !reserved.contains(&tile.id))
    }

    pub fn work_tiles_except<'s>(
        &'s self,
        reserved: &'s BTreeSet<TileId>,
    ) -> impl Iterator<Item = &'a Tile> + 's {
        self.site
            .tiles()
            .iter()
            .filter(move |tile| !reserved.contains(&tile.id))
    }

    /// Highest-yield candidate for `goods`. Candidates that cannot produce
    /// it are ignored; among equal yields the first candidate wins.
    pub fn find_best_tile_for_producing<'t, I>(candidates: I, goods: GoodsId) -> Option<&'t Tile>
    where
        I: IntoIterator<Item = &'t Tile>,
    {
        candidates
            .into_iter()
            .fold(None, |best: Option<(&'t Tile, u32)>, tile| {
                let amount = tile.yield_of(goods);
                match best {
                    _ if amount == 0 => best,
                    Some((_, best_amount)) if best_amount >= amount => best,
                    _ => Some((tile, amount)),
                }
            })
            .map(|(tile, _)| tile)
    }

    pub fn tile_plans_producing(&self, goods: GoodsId) -> impl Iterator<Item = &TilePlan> + '_ {
        self.tile_plans
            .values()
            .filter(move |plan| plan.goods == goods)
    }

    /// Tile-level output per goods type: the colony centre plus every tile
    /// plan. Buildings are not included.
    pub fn determine_tentative_production(&self) -> GoodsTally {
        self.tentative_production_after(&[])
    }

    pub fn tentative_production_after(&self, proposed: &[TilePlan]) -> GoodsTally {
        let mut tally = GoodsTally::new();
        for entry in self.site.center().iter().filter(|entry| entry.amount > 0) {
            let total = tally.entry(entry.goods).or_insert(0);
            *total = total.saturating_add(entry.amount);
        }
        for plan in self.projected_tile_plans(proposed).values() {
            let amount = self.plan_yield(plan);
            if amount > 0 {
                let total = tally.entry(plan.goods).or_insert(0);
                *total = total.saturating_add(amount);
            }
        }
        tally
    }

    /// Food surplus if `proposed` were added or replaced, counting every tile
    /// still left vacant as a food tile when that would pay for its worker.
    /// Does not touch the plan.
    pub fn possible_vacant_tile_food_surplus_after(&self, proposed: &[TilePlan]) -> i64 {
        let per_worker = i64::from(self.food_consumed_by_one_worker());
        let projected = self.projected_tile_plans(proposed);

        let mut surplus = self.center_food();
        for plan in projected.values() {
            if self.rules.is_food(plan.goods) {
                surplus += i64::from(self.plan_yield(plan));
            }
            surplus -= per_worker;
        }
        surplus -= per_worker * self.worker_plans.len() as i64;

        for tile in self.site.tiles() {
            if projected.contains_key(&tile.id) {
                continue;
            }
            if let Some(food) = tile.best_food(self.rules) {
                surplus += (i64::from(food.amount) - per_worker).max(0);
            }
        }
        surplus
    }

    /// Food left over by the plan as it stands, without counting vacant tiles.
    pub fn determine_food_surplus(&self) -> i64 {
        let per_worker = i64::from(self.food_consumed_by_one_worker());
        let tile_food: i64 = self
            .tile_plans
            .values()
            .filter(|plan| self.rules.is_food(plan.goods))
            .map(|plan| i64::from(self.plan_yield(plan)))
            .sum();
        let workers = (self.tile_plans.len() + self.worker_plans.len()) as i64;
        self.center_food() + tile_food - per_worker * workers
    }

    pub fn food_consumed_by_one_worker(&self) -> u32 {
        self.rules.food_per_worker()
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Assigns the plan's tile, returning whatever plan it replaced.
    pub fn add_or_replace(&mut self, plan: TilePlan) -> Result<Option<TilePlan>, PlanError> {
        self.check_tile(plan.tile)?;
        Ok(self.tile_plans.insert(plan.tile, plan))
    }

    /// Marks a building type for construction. Returns false if it already was.
    pub fn add_buildable(&mut self, building: BuildingTypeId) -> Result<bool, PlanError> {
        self.building_type(building)?;
        Ok(self.buildables.insert(building))
    }

    pub fn add_building_worker_plan(&mut self, plan: WorkerPlan) -> Result<(), PlanError> {
        let building = self.building_type(plan.building)?;
        if self.workers_in(plan.building) >= building.workplaces {
            return Err(exhausted(building));
        }
        self.worker_plans.push(plan);
        Ok(())
    }

    /// Applies every change or none. All validation happens before the
    /// first mutation.
    pub fn commit(&mut self, changes: PlanChanges) -> Result<(), PlanError> {
        for plan in &changes.tile_plans {
            self.check_tile(plan.tile)?;
        }
        for building in &changes.buildables {
            self.building_type(*building)?;
        }
        let mut staffed: BTreeMap<BuildingTypeId, u32> = BTreeMap::new();
        for plan in &changes.worker_plans {
            let building = self.building_type(plan.building)?;
            let count = staffed
                .entry(plan.building)
                .or_insert_with(|| self.workers_in(plan.building));
            if *count >= building.workplaces {
                return Err(exhausted(building));
            }
            *count += 1;
        }

        for plan in changes.tile_plans {
            self.tile_plans.insert(plan.tile, plan);
        }
        self.buildables.extend(changes.buildables);
        self.worker_plans.extend(changes.worker_plans);
        Ok(())
    }

    pub fn outcome(&self) -> PlanOutcome {
        PlanOutcome {
            tile_plans: self.tile_plans.values().copied().collect(),
            worker_plans: self.worker_plans.clone(),
            buildables: self.buildables.iter().copied().collect(),
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn projected_tile_plans(&self, proposed: &[TilePlan]) -> BTreeMap<TileId, TilePlan> {
        let mut projected = self.tile_plans.clone();
        for plan in proposed {
            projected.insert(plan.tile, *plan);
        }
        projected
    }

    fn plan_yield(&self, plan: &TilePlan) -> u32 {
        self.site
            .tile(plan.tile)
            .map(|tile| tile.yield_of(plan.goods))
            .unwrap_or(0)
    }

    fn center_food(&self) -> i64 {
        self.site
            .center()
            .iter()
            .filter(|entry| self.rules.is_food(entry.goods))
            .map(|entry| i64::from(entry.amount))
            .sum()
    }

    fn check_tile(&self, tile: TileId) -> Result<(), PlanError> {
        match self.site.tile(tile) {
            Some(_) => Ok(()),
            None => Err(PlanError::UnknownTile(tile.raw())),
        }
    }

    fn building_type(&self, building: BuildingTypeId) -> Result<&'a BuildingType, PlanError> {
        self.rules
            .building_types()
            .get(building.raw())
            .ok_or(PlanError::UnknownBuilding(building.raw()))
    }
}

fn exhausted(building: &BuildingType) -> PlanError {
    PlanError::WorkplacesExhausted {
        building: building.name.clone(),
        workplaces: building.workplaces,
    }
}
