use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::rules::{GoodsAmount, GoodsId, Ruleset, RulesError};

/// Position of a work tile in its site's fixed order. Tie-breaks between
/// equally good tiles always resolve towards the lower id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId(usize);

impl TileId {
    pub fn raw(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tile {
    pub id: TileId,
    pub resource: Option<GoodsId>,
    potential: Vec<GoodsAmount>,
}

impl Tile {
    /// Builds a tile, sorting its potential outputs by descending yield.
    /// The sort is stable, so equal yields keep their given order.
    pub fn new(id: TileId, resource: Option<GoodsId>, mut potential: Vec<GoodsAmount>) -> Self {
        potential.retain(|entry| entry.amount > 0);
        potential.sort_by(|a, b| b.amount.cmp(&a.amount));
        Self {
            id,
            resource,
            potential,
        }
    }

    pub fn potential(&self) -> &[GoodsAmount] {
        &self.potential
    }

    /// Expert yield of `goods` on this tile, zero when it cannot be produced.
    pub fn yield_of(&self, goods: GoodsId) -> u32 {
        self.potential
            .iter()
            .find(|entry| entry.goods == goods)
            .map(|entry| entry.amount)
            .unwrap_or(0)
    }

    pub fn is_pure_food(&self, rules: &Ruleset) -> bool {
        !self.potential.is_empty()
            && self
                .potential
                .iter()
                .all(|entry| rules.is_food(entry.goods))
    }

    pub fn best_food(&self, rules: &Ruleset) -> Option<GoodsAmount> {
        self.potential
            .iter()
            .find(|entry| rules.is_food(entry.goods))
            .copied()
    }
}

/// The work tiles surrounding one settlement plus the colony centre, whose
/// production needs no worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColonySite {
    center: Vec<GoodsAmount>,
    tiles: Vec<Tile>,
}

impl ColonySite {
    pub fn new(center: Vec<GoodsAmount>, tiles: Vec<(Option<GoodsId>, Vec<GoodsAmount>)>) -> Self {
        let tiles = tiles
            .into_iter()
            .enumerate()
            .map(|(index, (resource, potential))| Tile::new(TileId(index), resource, potential))
            .collect();
        Self { center, tiles }
    }

    pub fn from_config(config: &SiteConfig, rules: &Ruleset) -> Result<Self, RulesError> {
        let center = rules.resolve_amounts(&config.center, "colony centre")?;
        let mut tiles = Vec::with_capacity(config.tiles.len());
        for (index, tile) in config.tiles.iter().enumerate() {
            let context = format!("tile {index}");
            let resource = tile
                .resource
                .as_deref()
                .map(|name| rules.resolve_goods(name, &context))
                .transpose()?;
            let potential = rules.resolve_amounts(&tile.potential, &context)?;
            tiles.push((resource, potential));
        }
        Ok(Self::new(center, tiles))
    }

    pub fn center(&self) -> &[GoodsAmount] {
        &self.center
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.0)
    }
}
