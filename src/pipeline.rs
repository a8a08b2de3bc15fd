use std::fmt;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::plan::{PlanChanges, PlanError, PlanOutcome, TentativeColonyPlan};
use crate::production::{GoodsTally, ProductionCalculator, RecipeProductionCalculator, Turn};
use crate::rules::Ruleset;
use crate::site::ColonySite;
use crate::steps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerSettings {
    pub turn: Turn,
    pub stock_ceiling: u32,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            turn: Turn(1),
            stock_ceiling: 100,
        }
    }
}

pub struct StepContext<'a> {
    pub turn: Turn,
    pub stock_ceiling: u32,
    pub calculator: &'a dyn ProductionCalculator,
}

/// Why a step left the plan alone. Not an error: the goal is simply out of
/// reach on this pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    NothingToDo,
    NoTerminalMaterialBuilding,
    MissingRawMaterial { goods: String },
    InsufficientFood { surplus: i64, required: u32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NothingToDo => write!(f, "nothing to do"),
            SkipReason::NoTerminalMaterialBuilding => {
                write!(f, "no terminal building produces an unstorable material")
            }
            SkipReason::MissingRawMaterial { goods } => {
                write!(f, "no work tile is left to produce {goods}")
            }
            SkipReason::InsufficientFood { surplus, required } => {
                write!(f, "food surplus {surplus} below the {required} one worker needs")
            }
        }
    }
}

pub enum StepDecision {
    Commit(PlanChanges),
    Skip(SkipReason),
}

/// One entry of the planning catalogue.
///
/// `evaluate` only reads the plan. Whatever it returns in
/// [`StepDecision::Commit`] is applied by the pipeline in one go.
pub trait PlanningStep: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, ctx: &StepContext<'_>, plan: &TentativeColonyPlan<'_>) -> StepDecision;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StepOutcome {
    Committed {
        tile_plans: usize,
        buildables: usize,
        worker_plans: usize,
    },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
    pub duration_ms: f64,
}

impl StepReport {
    pub fn committed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Committed { .. })
    }
}

#[derive(Default)]
pub struct StepPipeline {
    steps: Vec<Box<dyn PlanningStep>>,
}

impl StepPipeline {
    pub fn new(steps: Vec<Box<dyn PlanningStep>>) -> Self {
        Self { steps }
    }

    pub fn standard() -> Self {
        Self::new(steps::standard_catalogue())
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Runs every step once, in order, against `plan`.
    pub fn run(
        &self,
        ctx: &StepContext<'_>,
        plan: &mut TentativeColonyPlan<'_>,
    ) -> Result<Vec<StepReport>, PlanError> {
        let mut reports = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let start = Instant::now();
            let outcome = match step.evaluate(ctx, plan) {
                StepDecision::Commit(changes) => {
                    let outcome = StepOutcome::Committed {
                        tile_plans: changes.tile_plans.len(),
                        buildables: changes.buildables.len(),
                        worker_plans: changes.worker_plans.len(),
                    };
                    plan.commit(changes)?;
                    debug!(step = step.name(), ?outcome, "step committed");
                    outcome
                }
                StepDecision::Skip(reason) => {
                    debug!(step = step.name(), %reason, "step skipped");
                    StepOutcome::Skipped(reason)
                }
            };
            reports.push(StepReport {
                name: step.name().to_string(),
                outcome,
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
            });
        }
        Ok(reports)
    }
}

/// A finished candidate together with what each step did to it.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedColony {
    pub outcome: PlanOutcome,
    pub steps: Vec<StepReport>,
    pub production: GoodsTally,
    pub food_surplus: i64,
}

pub struct PlannerBuilder {
    settings: PlannerSettings,
    steps: Vec<Box<dyn PlanningStep>>,
    calculator: Box<dyn ProductionCalculator>,
}

impl PlannerBuilder {
    pub fn new(settings: PlannerSettings) -> Self {
        Self {
            settings,
            steps: Vec::new(),
            calculator: Box::new(RecipeProductionCalculator::new()),
        }
    }

    pub fn with_step(mut self, step: impl PlanningStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn with_standard_steps(mut self) -> Self {
        self.steps.extend(steps::standard_catalogue());
        self
    }

    pub fn with_calculator(mut self, calculator: impl ProductionCalculator + 'static) -> Self {
        self.calculator = Box::new(calculator);
        self
    }

    pub fn build(self) -> Planner {
        Planner {
            settings: self.settings,
            pipeline: StepPipeline::new(self.steps),
            calculator: self.calculator,
        }
    }
}

pub struct Planner {
    settings: PlannerSettings,
    pipeline: StepPipeline,
    calculator: Box<dyn ProductionCalculator>,
}

impl Planner {
    pub fn standard(settings: PlannerSettings) -> Self {
        PlannerBuilder::new(settings).with_standard_steps().build()
    }

    pub fn settings(&self) -> PlannerSettings {
        self.settings
    }

    pub fn pipeline(&self) -> &StepPipeline {
        &self.pipeline
    }

    pub fn context(&self) -> StepContext<'_> {
        StepContext {
            turn: self.settings.turn,
            stock_ceiling: self.settings.stock_ceiling,
            calculator: self.calculator.as_ref(),
        }
    }

    /// Plans `site` from scratch with a fresh tentative plan.
    pub fn plan(&self, rules: &Ruleset, site: &ColonySite) -> Result<PlannedColony, PlanError> {
        let mut plan = TentativeColonyPlan::new(rules, site);
        let steps = self.pipeline.run(&self.context(), &mut plan)?;
        let planned = PlannedColony {
            outcome: plan.outcome(),
            production: plan.determine_tentative_production(),
            food_surplus: plan.determine_food_surplus(),
            steps,
        };
        info!(
            turn = self.settings.turn.0,
            tile_plans = planned.outcome.tile_plans.len(),
            worker_plans = planned.outcome.worker_plans.len(),
            buildables = planned.outcome.buildables.len(),
            food_surplus = planned.food_surplus,
            "colony plan finished"
        );
        Ok(planned)
    }

    /// Plans several candidate sites in parallel against one ruleset.
    /// Results come back in the order of `sites`.
    pub fn plan_candidates(
        &self,
        rules: &Ruleset,
        sites: &[ColonySite],
    ) -> Vec<Result<PlannedColony, PlanError>> {
        sites.par_iter().map(|site| self.plan(rules, site)).collect()
    }
}
