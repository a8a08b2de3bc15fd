use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use colony_planner::{
    production::Turn,
    report::{PlanReport, ReportWriter},
    scenario::ScenarioLoader,
    sitegen::SiteGenerator,
    PlannedColony, Planner,
};

const DEFAULT_GENERATED_TILES: usize = 8;

#[derive(Debug, Parser)]
#[command(author, version, about = "Colony economic planner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/frontier.yaml")]
    scenario: PathBuf,

    /// Override the planning turn
    #[arg(long)]
    turn: Option<u32>,

    /// Override the warehouse ceiling for storable goods
    #[arg(long)]
    stock_ceiling: Option<u32>,

    /// Plan a generated site with this many work tiles instead of the scenario colony
    #[arg(long)]
    generate: Option<usize>,

    /// Seed for generated sites
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Plan this many generated sites in parallel and keep the best
    #[arg(long)]
    candidates: Option<usize>,

    /// Directory for plan reports
    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| scenario.logging.level.clone());
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rules = scenario
        .build_ruleset()
        .with_context(|| format!("Invalid rules in scenario '{}'", scenario.name))?;
    let mut settings = scenario.planner.settings();
    if let Some(turn) = cli.turn {
        settings.turn = Turn(turn);
    }
    if let Some(ceiling) = cli.stock_ceiling {
        settings.stock_ceiling = ceiling;
    }
    let planner = Planner::standard(settings);

    let (site, planned) = match cli.candidates {
        Some(count) => {
            let tiles = cli.generate.unwrap_or(DEFAULT_GENERATED_TILES);
            let sites = SiteGenerator::new(cli.seed).generate_many(&rules, tiles, count);
            let results = planner.plan_candidates(&rules, &sites);
            let (index, planned) = best_candidate(results)?;
            info!(candidate = index, count, "best candidate selected");
            (sites[index].clone(), planned)
        }
        None => {
            let site = match cli.generate {
                Some(tiles) => SiteGenerator::new(cli.seed).generate(&rules, tiles),
                None => scenario.build_site(&rules)?.ok_or_else(|| {
                    anyhow!(
                        "scenario '{}' defines no colony; pass --generate <tiles>",
                        scenario.name
                    )
                })?,
            };
            let planned = planner.plan(&rules, &site)?;
            (site, planned)
        }
    };

    let report = PlanReport::new(&scenario.name, settings.turn, &rules, &site, &planned);
    let path = ReportWriter::new(&cli.report_dir).write(&report)?;
    println!(
        "Scenario '{}' planned for turn {}: {} tile plans, {} workers, {} buildables, food surplus {}. Report: {}",
        scenario.name,
        settings.turn.0,
        report.tile_plans.len(),
        report.worker_plans.len(),
        report.buildables.len(),
        report.food_surplus,
        path.display()
    );
    Ok(())
}

/// Most buildables first, then highest food surplus. Earlier candidates win ties.
fn best_candidate<E: std::fmt::Display>(
    results: Vec<Result<PlannedColony, E>>,
) -> Result<(usize, PlannedColony)> {
    let mut best: Option<(usize, PlannedColony)> = None;
    for (index, result) in results.into_iter().enumerate() {
        let planned = match result {
            Ok(planned) => planned,
            Err(err) => {
                warn!(candidate = index, %err, "candidate plan failed");
                continue;
            }
        };
        let key = (planned.outcome.buildables.len(), planned.food_surplus);
        let better = best.as_ref().map_or(true, |(_, current)| {
            key > (current.outcome.buildables.len(), current.food_surplus)
        });
        if better {
            best = Some((index, planned));
        }
    }
    best.ok_or_else(|| anyhow!("no candidate site could be planned"))
}
