use crate::{
    pipeline::{PlanningStep, SkipReason, StepContext, StepDecision},
    plan::{PlanChanges, TentativeColonyPlan, TilePlan},
};

/// Puts an expert on every tile carrying a bonus resource, producing the
/// resource's goods. Later steps may still replace these plans.
pub struct BonusResourceStep;

impl BonusResourceStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BonusResourceStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanningStep for BonusResourceStep {
    fn name(&self) -> &str {
        "bonus_resources"
    }

    fn evaluate(&self, _ctx: &StepContext<'_>, plan: &TentativeColonyPlan<'_>) -> StepDecision {
        let tile_plans: Vec<TilePlan> = plan
            .site()
            .tiles()
            .iter()
            .filter_map(|tile| {
                let goods = tile.resource?;
                (tile.yield_of(goods) > 0).then(|| TilePlan::new(tile.id, goods))
            })
            .collect();
        if tile_plans.is_empty() {
            return StepDecision::Skip(SkipReason::NothingToDo);
        }
        StepDecision::Commit(PlanChanges::with_tile_plans(tile_plans))
    }
}
