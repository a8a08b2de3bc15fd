//! Seeded colony-site generation for candidate sweeps and property tests.

use rand::{seq::SliceRandom, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    rules::{GoodsAmount, GoodsId, Ruleset},
    site::ColonySite,
};

const MAX_OUTPUTS_PER_TILE: usize = 3;
const MAX_YIELD: u32 = 6;

/// Produces the same sequence of sites for the same seed and ruleset.
/// Each site draws from its own stream derived from the master seed, so
/// site `n` does not depend on the tile counts of earlier sites.
pub struct SiteGenerator {
    master: ChaCha8Rng,
}

impl SiteGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            master: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self, rules: &Ruleset, tile_count: usize) -> ColonySite {
        let mut stream = self.next_stream();
        build_site(rules, tile_count, &mut stream)
    }

    pub fn generate_many(
        &mut self,
        rules: &Ruleset,
        tile_count: usize,
        count: usize,
    ) -> Vec<ColonySite> {
        (0..count).map(|_| self.generate(rules, tile_count)).collect()
    }

    fn next_stream(&mut self) -> ChaCha8Rng {
        let mut seed_bytes = [0u8; 8];
        self.master.fill_bytes(&mut seed_bytes);
        ChaCha8Rng::seed_from_u64(u64::from_le_bytes(seed_bytes))
    }
}

fn build_site(rules: &Ruleset, tile_count: usize, rng: &mut ChaCha8Rng) -> ColonySite {
    let raw = rules.raw_goods();
    let center = raw
        .iter()
        .copied()
        .find(|goods| rules.is_food(*goods))
        .map(|food| vec![GoodsAmount::new(food, rng.gen_range(3..=MAX_YIELD))])
        .unwrap_or_default();

    let mut tiles: Vec<(Option<GoodsId>, Vec<GoodsAmount>)> = Vec::with_capacity(tile_count);
    for _ in 0..tile_count {
        if raw.is_empty() {
            tiles.push((None, Vec::new()));
            continue;
        }
        let outputs = rng.gen_range(1..=MAX_OUTPUTS_PER_TILE.min(raw.len()));
        let potential: Vec<GoodsAmount> = raw
            .choose_multiple(rng, outputs)
            .map(|goods| GoodsAmount::new(*goods, rng.gen_range(1..=MAX_YIELD)))
            .collect();
        let resource = if rng.gen_ratio(1, 6) {
            Some(potential[rng.gen_range(0..potential.len())].goods)
        } else {
            None
        };
        tiles.push((resource, potential));
    }
    ColonySite::new(center, tiles)
}
