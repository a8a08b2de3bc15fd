//! Ruleset and site builders shared by unit tests.

use crate::{
    pipeline::StepContext,
    production::{ProductionCalculator, Turn},
    rules::{GoodsAmount, GoodsId, Ruleset},
    scenario::Scenario,
    site::ColonySite,
};

pub(crate) const FRONTIER: &str = include_str!("../scenarios/frontier.yaml");

pub(crate) fn scenario() -> Scenario {
    serde_yaml::from_str(FRONTIER).expect("frontier scenario parses")
}

pub(crate) fn rules() -> Ruleset {
    Ruleset::from_config(&scenario().rules).expect("frontier rules resolve")
}

pub(crate) fn goods(rules: &Ruleset, name: &str) -> GoodsId {
    rules
        .goods_by_name(name)
        .unwrap_or_else(|| panic!("unknown goods {name}"))
}

pub(crate) fn site(
    rules: &Ruleset,
    center: &[(&str, u32)],
    tiles: &[(Option<&str>, &[(&str, u32)])],
) -> ColonySite {
    let amounts = |entries: &[(&str, u32)]| -> Vec<GoodsAmount> {
        entries
            .iter()
            .map(|(name, amount)| GoodsAmount::new(goods(rules, name), *amount))
            .collect()
    };
    ColonySite::new(
        amounts(center),
        tiles
            .iter()
            .map(|(resource, potential)| {
                (resource.map(|name| goods(rules, name)), amounts(potential))
            })
            .collect(),
    )
}

pub(crate) fn context(calculator: &dyn ProductionCalculator) -> StepContext<'_> {
    StepContext {
        turn: Turn(1),
        stock_ceiling: 100,
        calculator,
    }
}
