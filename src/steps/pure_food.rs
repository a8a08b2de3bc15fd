use crate::{
    pipeline::{PlanningStep, SkipReason, StepContext, StepDecision},
    plan::{PlanChanges, TentativeColonyPlan, TilePlan},
};

/// Works every vacant tile that can only ever produce food, choosing its
/// highest-yield food. Nothing else competes for such tiles.
pub struct PureFoodStep;

impl PureFoodStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PureFoodStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanningStep for PureFoodStep {
    fn name(&self) -> &str {
        "pure_food"
    }

    fn evaluate(&self, _ctx: &StepContext<'_>, plan: &TentativeColonyPlan<'_>) -> StepDecision {
        let rules = plan.rules();
        let tile_plans: Vec<TilePlan> = plan
            .unassigned_work_tiles()
            .filter(|tile| tile.is_pure_food(rules))
            .filter_map(|tile| {
                tile.best_food(rules)
                    .map(|food| TilePlan::new(tile.id, food.goods))
            })
            .collect();
        if tile_plans.is_empty() {
            return StepDecision::Skip(SkipReason::NothingToDo);
        }
        StepDecision::Commit(PlanChanges::with_tile_plans(tile_plans))
    }
}
