pub mod config;
pub mod pipeline;
pub mod plan;
pub mod production;
pub mod report;
pub mod rules;
pub mod scenario;
pub mod site;
pub mod sitegen;
pub mod steps;

#[cfg(test)]
mod fixtures;

pub use pipeline::{PlannedColony, Planner, PlannerBuilder, PlannerSettings};
pub use plan::TentativeColonyPlan;
pub use rules::Ruleset;
pub use scenario::{Scenario, ScenarioLoader};
