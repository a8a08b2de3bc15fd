//! JSON reports of finished colony plans.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::{PlannedColony, StepReport};
use crate::plan::WorkerType;
use crate::production::Turn;
use crate::rules::Ruleset;
use crate::site::ColonySite;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TileReport {
    pub tile: usize,
    pub goods: String,
    pub amount: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: String,
    pub building: String,
    pub goods: String,
}

/// Plan outcome with every id resolved to its rule name.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub scenario: String,
    pub turn: u32,
    pub generated_at: String,
    pub tile_plans: Vec<TileReport>,
    pub worker_plans: Vec<WorkerReport>,
    pub buildables: Vec<String>,
    pub production: BTreeMap<String, u32>,
    pub food_surplus: i64,
    pub steps: Vec<StepReport>,
}

impl PlanReport {
    pub fn new(
        scenario: &str,
        turn: Turn,
        rules: &Ruleset,
        site: &ColonySite,
        planned: &PlannedColony,
    ) -> Self {
        let goods_name = |id| rules.goods(id).name.clone();
        let tile_plans = planned
            .outcome
            .tile_plans
            .iter()
            .map(|plan| TileReport {
                tile: plan.tile.raw(),
                goods: goods_name(plan.goods),
                amount: site
                    .tile(plan.tile)
                    .map(|tile| tile.yield_of(plan.goods))
                    .unwrap_or(0),
            })
            .collect();
        let worker_plans = planned
            .outcome
            .worker_plans
            .iter()
            .map(|plan| WorkerReport {
                worker: match plan.worker {
                    WorkerType::Expert(expert) => rules.expert(expert).name.clone(),
                    WorkerType::FreeColonist => "free_colonist".to_string(),
                },
                building: rules.building(plan.building).name.clone(),
                goods: goods_name(plan.goods),
            })
            .collect();
        let buildables = planned
            .outcome
            .buildables
            .iter()
            .map(|id| rules.building(*id).name.clone())
            .collect();
        let production = planned
            .production
            .iter()
            .map(|(goods, amount)| (goods_name(*goods), *amount))
            .collect();

        Self {
            scenario: scenario.to_string(),
            turn: turn.0,
            generated_at: chrono::Utc::now().to_rfc3339(),
            tile_plans,
            worker_plans,
            buildables,
            production,
            food_surplus: planned.food_surplus,
            steps: planned.steps.clone(),
        }
    }
}

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Writes `report` as `<dir>/<scenario>/plan_turn_<turn>.json` and
    /// returns the file path.
    pub fn write(&self, report: &PlanReport) -> Result<PathBuf> {
        let dir = self.output_dir.join(&report.scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report dir {}", dir.display()))?;
        let path = dir.join(format!("plan_turn_{:04}.json", report.turn));
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{rules, site};
    use crate::pipeline::{Planner, PlannerSettings};
    use tempfile::tempdir;

    #[test]
    fn report_resolves_names_and_lands_in_scenario_dir() {
        let rules = rules();
        let site = site(
            &rules,
            &[("grain", 5)],
            &[
                (Some("ore"), &[("ore", 4), ("lumber", 2)]),
                (None, &[("fish", 3)]),
                (None, &[("lumber", 3)]),
            ],
        );
        let planned = Planner::standard(PlannerSettings::default())
            .plan(&rules, &site)
            .unwrap();
        let report = PlanReport::new("river", Turn(7), &rules, &site, &planned);
        assert_eq!(
            report.tile_plans,
            vec![
                TileReport {
                    tile: 0,
                    goods: "ore".into(),
                    amount: 4
                },
                TileReport {
                    tile: 1,
                    goods: "fish".into(),
                    amount: 3
                },
                TileReport {
                    tile: 2,
                    goods: "lumber".into(),
                    amount: 3
                },
            ]
        );
        assert_eq!(report.buildables, vec!["lumber_mill".to_string()]);
        assert_eq!(report.production.get("grain"), Some(&5));

        let dir = tempdir().unwrap();
        let path = ReportWriter::new(dir.path()).write(&report).unwrap();
        assert_eq!(path, dir.path().join("river").join("plan_turn_0007.json"));
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["turn"], 7);
        assert_eq!(written["steps"].as_array().map(Vec::len), Some(3));
    }
}
