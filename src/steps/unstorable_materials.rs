//! Brings terminal buildings for unstorable building materials online.
//!
//! The step first secures a tile for every raw material such a building
//! consumes and nobody produces yet, then checks that the colony can still
//! feed at least one more worker, and only then marks the buildings for
//! construction and staffs them. Any failed precondition leaves the plan
//! exactly as it was.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{
    pipeline::{PlanningStep, SkipReason, StepContext, StepDecision},
    plan::{PlanChanges, TentativeColonyPlan, TilePlan, WorkerPlan, WorkerType},
    production::{GoodsTally, StockContext},
    rules::{BuildingType, BuildingTypeId, GoodsId, Recipe, Ruleset},
};

pub struct UnstorableMaterialsStep;

impl UnstorableMaterialsStep {
    pub fn new() -> Self {
        Self
    }

    fn propose(
        &self,
        ctx: &StepContext<'_>,
        plan: &TentativeColonyPlan<'_>,
    ) -> Result<PlanChanges, SkipReason> {
        let rules = plan.rules();
        let buildings = terminal_material_buildings(rules);
        if buildings.is_empty() {
            return Err(SkipReason::NoTerminalMaterialBuilding);
        }

        let missing = missing_raw_materials(&buildings, &plan.determine_tentative_production());
        let tile_plans = choose_raw_material_tiles(plan, &missing)?;

        // An overridden tile may have been the only source of another input.
        let available = plan.tentative_production_after(&tile_plans);
        if let Some(lost) = missing_raw_materials(&buildings, &available).first() {
            return Err(SkipReason::MissingRawMaterial {
                goods: rules.goods(*lost).name.clone(),
            });
        }

        let required = plan.food_consumed_by_one_worker();
        let surplus = plan.possible_vacant_tile_food_surplus_after(&tile_plans);
        if surplus < i64::from(required) {
            return Err(SkipReason::InsufficientFood { surplus, required });
        }

        let mut changes = PlanChanges::with_tile_plans(tile_plans);
        for building in buildings {
            changes.buildables.push(building.id);
            let workers = staff_building(ctx, plan, building, &available, &changes.worker_plans);
            changes.worker_plans.extend(workers);
        }
        Ok(changes)
    }
}

impl Default for UnstorableMaterialsStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanningStep for UnstorableMaterialsStep {
    fn name(&self) -> &str {
        "unstorable_materials"
    }

    fn evaluate(&self, ctx: &StepContext<'_>, plan: &TentativeColonyPlan<'_>) -> StepDecision {
        match self.propose(ctx, plan) {
            Ok(changes) => StepDecision::Commit(changes),
            Err(reason) => StepDecision::Skip(reason),
        }
    }
}

fn terminal_material_buildings(rules: &Ruleset) -> Vec<&BuildingType> {
    rules
        .building_types()
        .iter()
        .filter(|building| building.is_terminal())
        .filter(|building| {
            building
                .produces()
                .map_or(false, |goods| rules.goods(goods).is_unstorable_building_material())
        })
        .collect()
}

/// Recipe inputs with no tile-level production yet, first-seen order.
fn missing_raw_materials(buildings: &[&BuildingType], production: &GoodsTally) -> Vec<GoodsId> {
    let mut missing = Vec::new();
    for recipe in buildings.iter().filter_map(|b| b.primary_recipe()) {
        for input in &recipe.inputs {
            let produced = production.get(&input.goods).copied().unwrap_or(0);
            if produced == 0 && !missing.contains(&input.goods) {
                missing.push(input.goods);
            }
        }
    }
    missing
}

/// Picks one tile per missing raw material. A tile an earlier step already
/// claimed for other goods is only taken over when no vacant tile can
/// produce the material at all.
fn choose_raw_material_tiles(
    plan: &TentativeColonyPlan<'_>,
    missing: &[GoodsId],
) -> Result<Vec<TilePlan>, SkipReason> {
    let rules = plan.rules();
    let mut reserved = BTreeSet::new();
    let mut chosen = Vec::with_capacity(missing.len());
    for &goods in missing {
        let best = TentativeColonyPlan::find_best_tile_for_producing(
            plan.work_tiles_except(&reserved),
            goods,
        )
        .ok_or_else(|| SkipReason::MissingRawMaterial {
            goods: rules.goods(goods).name.clone(),
        })?;

        let tile = match plan.tile_plan(best.id) {
            Some(claimed) if claimed.goods != goods => {
                TentativeColonyPlan::find_best_tile_for_producing(
                    plan.unassigned_except(&reserved),
                    goods,
                )
                .unwrap_or(best)
            }
            _ => best,
        };
        debug!(
            goods = %rules.goods(goods).name,
            tile = tile.id.raw(),
            amount = tile.yield_of(goods),
            "raw material tile chosen"
        );
        reserved.insert(tile.id);
        chosen.push(TilePlan::new(tile.id, goods));
    }
    Ok(chosen)
}

/// Workers for `building` on top of the ones it already has. `pending` holds
/// workers proposed for other buildings in the same pass; their draw on the
/// staffing input is taken off `available` first.
fn staff_building(
    ctx: &StepContext<'_>,
    plan: &TentativeColonyPlan<'_>,
    building: &BuildingType,
    available: &GoodsTally,
    pending: &[WorkerPlan],
) -> Vec<WorkerPlan> {
    let rules = plan.rules();
    let Some(goods) = building.produces() else {
        return Vec::new();
    };
    let worker = WorkerPlan {
        worker: WorkerType::best_for(rules, goods),
        building: building.id,
        goods,
    };
    let existing = plan.workers_in(building.id);
    let stock = StockContext::with_available(available.clone());

    let (per_worker, supply) = match building.primary_recipe().and_then(Recipe::dominant_input) {
        Some(input) => {
            let info = ctx.calculator.calculate(
                rules,
                building,
                ctx.turn,
                &[worker],
                &stock,
                ctx.stock_ceiling,
            );
            let drawn = drawn_by_other_buildings(ctx, plan, building, input.goods, &stock, pending);
            (
                info.maximum_consumed(input.goods),
                available
                    .get(&input.goods)
                    .copied()
                    .unwrap_or(0)
                    .saturating_sub(drawn),
            )
        }
        None => (0, 0),
    };

    let count = staffing_count(existing, building.workplaces, per_worker, supply);
    debug!(
        building = %building.name,
        existing,
        per_worker,
        supply,
        count,
        "building staffed"
    );
    vec![worker; count as usize]
}

/// Maximum consumption of `input` by every planned or pending worker outside
/// `building`, grouped per building.
fn drawn_by_other_buildings(
    ctx: &StepContext<'_>,
    plan: &TentativeColonyPlan<'_>,
    building: &BuildingType,
    input: GoodsId,
    stock: &StockContext,
    pending: &[WorkerPlan],
) -> u32 {
    let rules = plan.rules();
    let mut by_building: BTreeMap<BuildingTypeId, Vec<WorkerPlan>> = BTreeMap::new();
    for worker in plan.worker_plans().iter().chain(pending) {
        if worker.building != building.id {
            by_building.entry(worker.building).or_default().push(*worker);
        }
    }
    by_building
        .iter()
        .map(|(other, workers)| {
            ctx.calculator
                .calculate(
                    rules,
                    rules.building(*other),
                    ctx.turn,
                    workers,
                    stock,
                    ctx.stock_ceiling,
                )
                .maximum_consumed(input)
        })
        .fold(0, u32::saturating_add)
}

/// How many workers to add to a building that already has `existing`. A
/// worker joins while a workplace is free, unless the building is staffed
/// and `per_worker × (N + 1)` would reach `available`, N being its current
/// count. An empty building always gets its first worker.
pub(crate) fn staffing_count(
    existing: u32,
    workplaces: u32,
    per_worker: u32,
    available: u32,
) -> u32 {
    let mut staffed = existing;
    while staffed < workplaces {
        if staffed > 0 && u64::from(per_worker) * u64::from(staffed + 1) >= u64::from(available) {
            break;
        }
        staffed += 1;
    }
    staffed - existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::fixtures::{context, goods, rules, site};
    use crate::pipeline::{StepOutcome, StepPipeline};
    use crate::production::{ProductionCalculator, ProductionInfo, RecipeProductionCalculator, Turn};
    use crate::steps::{BonusResourceStep, PureFoodStep};

    /// A mill needing two raw inputs next to a kiln sharing one of them.
    const TWO_INPUT_RULES: &str = r#"
goods:
  - { id: grain, food: true }
  - { id: lumber }
  - { id: ore }
  - { id: hammers, storable: false, building_material: true }
  - { id: bricks, storable: false, building_material: true }
buildings:
  - id: mill
    workplaces: 3
    recipes:
      - inputs: [{ goods: lumber, amount: 3 }, { goods: ore, amount: 3 }]
        outputs: [{ goods: hammers, amount: 3 }]
  - id: kiln
    workplaces: 3
    recipes:
      - inputs: [{ goods: lumber, amount: 3 }]
        outputs: [{ goods: bricks, amount: 3 }]
"#;

    fn two_input_rules() -> Ruleset {
        let config: RulesConfig = serde_yaml::from_str(TWO_INPUT_RULES).unwrap();
        Ruleset::from_config(&config).unwrap()
    }

    /// Reports a fixed per-worker consumption of every recipe input.
    struct FlatCalculator(u32);

    impl ProductionCalculator for FlatCalculator {
        fn calculate(
            &self,
            _rules: &Ruleset,
            building: &BuildingType,
            _turn: Turn,
            workers: &[WorkerPlan],
            _stock: &StockContext,
            _stock_ceiling: u32,
        ) -> ProductionInfo {
            let mut info = ProductionInfo::default();
            if let Some(recipe) = building.primary_recipe() {
                for input in &recipe.inputs {
                    info.maximum_consumption
                        .insert(input.goods, self.0 * workers.len() as u32);
                }
            }
            info
        }
    }

    fn commit(
        ctx: &StepContext<'_>,
        plan: &mut TentativeColonyPlan<'_>,
    ) -> Result<(), SkipReason> {
        match UnstorableMaterialsStep::new().evaluate(ctx, plan) {
            StepDecision::Commit(changes) => {
                plan.commit(changes).unwrap();
                Ok(())
            }
            StepDecision::Skip(reason) => Err(reason),
        }
    }

    #[test]
    fn staffing_leaves_headroom_before_supply_runs_out() {
        assert_eq!(staffing_count(0, 3, 5, 12), 2);
        assert_eq!(staffing_count(0, 3, 1, 100), 3);
        assert_eq!(staffing_count(0, 3, 6, 6), 1);
        assert_eq!(staffing_count(0, 3, 0, 0), 1);
        assert_eq!(staffing_count(0, 0, 5, 12), 0);
    }

    #[test]
    fn staffing_counts_workers_already_in_the_building() {
        assert_eq!(staffing_count(2, 3, 5, 12), 0);
        assert_eq!(staffing_count(1, 3, 5, 12), 1);
        assert_eq!(staffing_count(1, 3, 1, 100), 2);
        assert_eq!(staffing_count(3, 3, 1, 100), 0);
        assert_eq!(staffing_count(1, 3, 6, 6), 0);
    }

    #[test]
    fn staffs_the_worked_example() {
        let rules = rules();
        let site = site(&rules, &[("grain", 6)], &[(Some("lumber"), &[("lumber", 12)])]);
        let mut plan = TentativeColonyPlan::new(&rules, &site);
        plan.add_or_replace(TilePlan::new(site.tiles()[0].id, goods(&rules, "lumber")))
            .unwrap();
        let calculator = FlatCalculator(5);

        commit(&context(&calculator), &mut plan).unwrap();

        let mill = rules.building_by_name("lumber_mill").unwrap();
        assert_eq!(rules.building(mill).workplaces, 3);
        assert_eq!(plan.workers_in(mill), 2);
        assert!(plan.is_buildable(mill));
        assert_eq!(plan.tile_plans().count(), 1, "lumber was already produced");
    }

    #[test]
    fn claims_a_raw_material_tile_and_staffs_one_expert() {
        let rules = rules();
        let site = site(
            &rules,
            &[("grain", 5)],
            &[(None, &[("grain", 3)]), (None, &[("lumber", 6), ("grain", 2)])],
        );
        let mut plan = TentativeColonyPlan::new(&rules, &site);
        let calculator = RecipeProductionCalculator::new();

        commit(&context(&calculator), &mut plan).unwrap();

        let lumber = goods(&rules, "lumber");
        let hammers = goods(&rules, "hammers");
        let mill = rules.building_by_name("lumber_mill").unwrap();
        assert_eq!(
            plan.outcome().tile_plans,
            vec![TilePlan::new(site.tiles()[1].id, lumber)]
        );
        assert_eq!(plan.outcome().buildables, vec![mill]);
        assert_eq!(
            plan.worker_plans(),
            &[WorkerPlan {
                worker: WorkerType::Expert(rules.expert_for(hammers).unwrap()),
                building: mill,
                goods: hammers,
            }]
        );
        let carpenter = rules.building_by_name("carpenter_house").unwrap();
        assert!(!plan.is_buildable(carpenter), "only terminal buildings");
    }

    #[test]
    fn bonus_resource_tiles_are_not_taken_over_when_a_fallback_exists() {
        let rules = rules();
        let site = site(
            &rules,
            &[("grain", 6)],
            &[
                (Some("ore"), &[("lumber", 8), ("ore", 4)]),
                (None, &[("lumber", 5)]),
            ],
        );
        let mut plan = TentativeColonyPlan::new(&rules, &site);
        let ore_tile = site.tiles()[0].id;
        plan.add_or_replace(TilePlan::new(ore_tile, goods(&rules, "ore")))
            .unwrap();
        let calculator = RecipeProductionCalculator::new();

        commit(&context(&calculator), &mut plan).unwrap();

        assert_eq!(plan.tile_plan(ore_tile).unwrap().goods, goods(&rules, "ore"));
        assert_eq!(
            plan.tile_plan(site.tiles()[1].id).unwrap().goods,
            goods(&rules, "lumber")
        );
    }

    #[test]
    fn claimed_tile_is_overridden_when_nothing_else_produces_the_material() {
        let rules = rules();
        let site = site(
            &rules,
            &[("grain", 6)],
            &[(Some("ore"), &[("lumber", 8), ("ore", 4)]), (None, &[("grain", 4)])],
        );
        let mut plan = TentativeColonyPlan::new(&rules, &site);
        let ore_tile = site.tiles()[0].id;
        plan.add_or_replace(TilePlan::new(ore_tile, goods(&rules, "ore")))
            .unwrap();
        let calculator = RecipeProductionCalculator::new();

        commit(&context(&calculator), &mut plan).unwrap();

        assert_eq!(
            plan.tile_plan(ore_tile).unwrap().goods,
            goods(&rules, "lumber")
        );
    }

    #[test]
    fn missing_raw_material_aborts_without_changes() {
        let rules = rules();
        let site = site(&rules, &[("grain", 8)], &[(None, &[("grain", 4), ("ore", 3)])]);
        let plan = TentativeColonyPlan::new(&rules, &site);
        let calculator = RecipeProductionCalculator::new();

        let decision = UnstorableMaterialsStep::new().evaluate(&context(&calculator), &plan);
        assert!(matches!(
            decision,
            StepDecision::Skip(SkipReason::MissingRawMaterial { goods: ref name }) if name == "lumber"
        ));
    }

    #[test]
    fn insufficient_food_aborts_without_changes() {
        let rules = rules();
        let site = site(&rules, &[("furs", 2)], &[(None, &[("lumber", 6)])]);
        let mut plan = TentativeColonyPlan::new(&rules, &site);
        let calculator = RecipeProductionCalculator::new();
        let before = plan.outcome();

        let result = commit(&context(&calculator), &mut plan);
        assert_eq!(
            result,
            Err(SkipReason::InsufficientFood {
                surplus: -2,
                required: 2
            })
        );
        assert_eq!(plan.outcome(), before);
    }

    #[test]
    fn repeated_runs_keep_headroom_and_unique_buildables() {
        let rules = rules();
        let site = site(&rules, &[("grain", 20)], &[(Some("lumber"), &[("lumber", 12)])]);
        let mut plan = TentativeColonyPlan::new(&rules, &site);
        plan.add_or_replace(TilePlan::new(site.tiles()[0].id, goods(&rules, "lumber")))
            .unwrap();
        let calculator = FlatCalculator(5);
        let ctx = context(&calculator);

        commit(&ctx, &mut plan).unwrap();
        commit(&ctx, &mut plan).unwrap();
        commit(&ctx, &mut plan).unwrap();

        let mill = rules.building_by_name("lumber_mill").unwrap();
        assert_eq!(plan.outcome().buildables, vec![mill]);
        assert_eq!(plan.workers_in(mill), 2);
        assert!(5 * plan.workers_in(mill) < 12);
    }

    #[test]
    fn claimed_tile_feeding_another_input_is_not_taken_over() {
        let rules = two_input_rules();
        let site = site(
            &rules,
            &[("grain", 10)],
            &[(Some("ore"), &[("lumber", 8), ("ore", 4)])],
        );
        let mut plan = TentativeColonyPlan::new(&rules, &site);
        let ore_tile = site.tiles()[0].id;
        plan.add_or_replace(TilePlan::new(ore_tile, goods(&rules, "ore")))
            .unwrap();
        let before = plan.outcome();
        let calculator = RecipeProductionCalculator::new();

        let result = commit(&context(&calculator), &mut plan);

        assert_eq!(
            result,
            Err(SkipReason::MissingRawMaterial {
                goods: "ore".into()
            })
        );
        assert_eq!(plan.outcome(), before);
    }

    #[test]
    fn each_missing_material_gets_its_own_tile() {
        let rules = two_input_rules();
        let site = site(
            &rules,
            &[("grain", 10)],
            &[(None, &[("lumber", 6), ("ore", 5)]), (None, &[("ore", 3)])],
        );
        let mut plan = TentativeColonyPlan::new(&rules, &site);
        let calculator = RecipeProductionCalculator::new();

        commit(&context(&calculator), &mut plan).unwrap();

        assert_eq!(
            plan.outcome().tile_plans,
            vec![
                TilePlan::new(site.tiles()[0].id, goods(&rules, "lumber")),
                TilePlan::new(site.tiles()[1].id, goods(&rules, "ore")),
            ]
        );
    }

    #[test]
    fn buildings_sharing_an_input_split_the_supply() {
        let rules = two_input_rules();
        let site = site(
            &rules,
            &[("grain", 10)],
            &[(None, &[("lumber", 12)]), (None, &[("ore", 12)])],
        );
        let mut plan = TentativeColonyPlan::new(&rules, &site);
        plan.add_or_replace(TilePlan::new(site.tiles()[0].id, goods(&rules, "lumber")))
            .unwrap();
        plan.add_or_replace(TilePlan::new(site.tiles()[1].id, goods(&rules, "ore")))
            .unwrap();
        let calculator = FlatCalculator(5);

        commit(&context(&calculator), &mut plan).unwrap();

        let mill = rules.building_by_name("mill").unwrap();
        let kiln = rules.building_by_name("kiln").unwrap();
        assert_eq!(plan.workers_in(mill), 2);
        assert_eq!(plan.workers_in(kiln), 1, "only 2 lumber left after the mill");
    }

    #[test]
    fn skipped_step_in_pipeline_leaves_plan_as_earlier_steps_built_it() {
        let rules = rules();
        let site = site(
            &rules,
            &[("grain", 8)],
            &[
                (Some("ore"), &[("ore", 4), ("grain", 2)]),
                (None, &[("fish", 4)]),
                (None, &[("grain", 4), ("furs", 3)]),
            ],
        );
        let calculator = RecipeProductionCalculator::new();
        let ctx = context(&calculator);
        let mut plan = TentativeColonyPlan::new(&rules, &site);
        StepPipeline::new(vec![Box::new(BonusResourceStep::new()), Box::new(PureFoodStep::new())])
            .run(&ctx, &mut plan)
            .unwrap();
        let before = plan.outcome();
        assert_eq!(before.tile_plans.len(), 2);

        let reports = StepPipeline::new(vec![Box::new(UnstorableMaterialsStep::new())])
            .run(&ctx, &mut plan)
            .unwrap();

        assert_eq!(
            reports[0].outcome,
            StepOutcome::Skipped(SkipReason::MissingRawMaterial {
                goods: "lumber".into()
            })
        );
        assert_eq!(plan.outcome(), before);
        assert!(plan.outcome().buildables.is_empty());
    }
}
