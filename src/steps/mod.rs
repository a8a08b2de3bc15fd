mod bonus_resources;
mod pure_food;
mod unstorable_materials;

pub use bonus_resources::BonusResourceStep;
pub use pure_food::PureFoodStep;
pub use unstorable_materials::UnstorableMaterialsStep;

use crate::pipeline::PlanningStep;

/// The planning steps in the order the planner runs them.
pub fn standard_catalogue() -> Vec<Box<dyn PlanningStep>> {
    vec![
        Box::new(BonusResourceStep::new()),
        Box::new(PureFoodStep::new()),
        Box::new(UnstorableMaterialsStep::new()),
    ]
}
