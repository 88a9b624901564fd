//! Per-seed mining pipeline: generate a world, simulate it, and assemble a
//! [`MineRecord`].

use crate::config::ScoreWeights;
use crate::expr::Program;
use crate::phash::compute_world_overlay_phash;
use crate::record::MineRecord;
use crate::world::{
    DepressionFillConfig, Hydrology, SeaFloodConfig, Simulator, Terrain, World, WorldGenerator,
};

/// Sentinel score substituted when a score expression produces a non-finite
/// or out-of-range result.
pub const SCORE_SENTINEL: f64 = -1.0e30;
const SCORE_CLAMP: f64 = 1.0e30;

fn extract_heights<W: World>(world: &W) -> Vec<f32> {
    let w = world.width();
    let h = world.height();
    let mut out = vec![0.0f32; (w.max(0) as usize) * (h.max(0) as usize)];
    for y in 0..h {
        for x in 0..w {
            out[(y * w + x) as usize] = world.at(x, y).height;
        }
    }
    out
}

fn build_water_drain_mask<W: World>(world: &W) -> Vec<u8> {
    let w = world.width();
    let h = world.height();
    let mut out = vec![0u8; (w.max(0) as usize) * (h.max(0) as usize)];
    for y in 0..h {
        for x in 0..w {
            out[(y * w + x) as usize] = u8::from(world.at(x, y).terrain == Terrain::Water);
        }
    }
    out
}

fn compute_tile_counts<W: World>(world: &W, record: &mut MineRecord) {
    use crate::world::Overlay;

    let w = world.width();
    let h = world.height();
    for y in 0..h {
        for x in 0..w {
            let tile = world.at(x, y);
            if tile.terrain == Terrain::Water {
                record.water_tiles += 1;
            }
            match tile.overlay {
                Overlay::Road => record.road_tiles += 1,
                Overlay::Residential => record.res_tiles += 1,
                Overlay::Commercial => record.com_tiles += 1,
                Overlay::Industrial => record.ind_tiles += 1,
                Overlay::Park => record.park_tiles += 1,
                Overlay::School => record.school_tiles += 1,
                Overlay::Hospital => record.hospital_tiles += 1,
                Overlay::PoliceStation => record.police_tiles += 1,
                Overlay::FireStation => record.fire_tiles += 1,
                Overlay::None => {}
            }
        }
    }

    let denom = (f64::from(w) * f64::from(h)).max(1.0);
    record.water_frac = f64::from(record.water_tiles) / denom;
    record.road_frac = f64::from(record.road_tiles) / denom;
    record.zone_frac =
        f64::from(record.res_tiles + record.com_tiles + record.ind_tiles) / denom;
    record.park_frac = f64::from(record.park_tiles) / denom;
}

/// Computes the objective score of `record` under `weights`.
///
/// Coefficients are preserved verbatim; they encode a deliberate relative
/// scale between terms, not arbitrary magic numbers.
#[must_use]
pub fn compute_score(record: &MineRecord, weights: &ScoreWeights) -> f64 {
    let pop = f64::from(record.stats.population.max(0));

    let happy_scale = 0.10 * pop + 500.0;
    let services_scale = 0.05 * pop + 250.0;
    const UNIT: f64 = 1000.0;

    let mut score = 0.0;
    score += weights.w_population * pop;
    score += weights.w_happiness * f64::from(record.stats.happiness) * happy_scale;
    score += weights.w_money * record.stats.money;
    score += weights.w_land_value * f64::from(record.stats.avg_land_value) * UNIT;
    score += weights.w_goods_satisfaction
        * f64::from(record.stats.goods_satisfaction)
        * (0.25 * UNIT);
    score += weights.w_services_satisfaction
        * f64::from(record.stats.services_overall_satisfaction)
        * services_scale;

    score -= weights.p_congestion * f64::from(record.stats.traffic_congestion) * (0.05 * pop + 200.0);
    score -= weights.p_sea_frac * record.sea_flood_frac * UNIT;
    score -= weights.p_sea_max_depth * record.sea_max_depth * UNIT;
    score -= weights.p_pond_frac * record.pond_frac * UNIT;
    score -= weights.p_pond_max_depth * record.pond_max_depth * UNIT;

    score
}

/// Hydrology configuration resolved for a single mining run.
#[derive(Clone, Copy, Debug)]
pub struct HydrologySettings {
    /// Whether hydrology analysis runs at all.
    pub enabled: bool,
    /// Resolved sea level (already substituted for the proc-gen default when
    /// `seaLevelOverride` was non-finite).
    pub sea_level: f32,
    /// Sea-flood connectivity configuration.
    pub sea: SeaFloodConfig,
    /// Depression-fill configuration.
    pub depression: DepressionFillConfig,
}

/// Mines a single seed end to end.
///
/// `generator`/`simulator`/`hydrology` are the host's external collaborators
/// (§6 of the shape contract); this function only orchestrates calling them
/// in the required order and assembling the resulting [`MineRecord`].
#[allow(clippy::too_many_arguments)]
pub fn mine_one<G, S, H>(
    seed: u64,
    w: i32,
    h: i32,
    days: i32,
    proc_cfg: &G::ProcConfig,
    generator: &G,
    simulator: &mut S,
    hydrology_settings: HydrologySettings,
    hydrology: &H,
    weights: &ScoreWeights,
    score_expr: Option<&Program>,
) -> MineRecord
where
    G: WorldGenerator,
    S: Simulator<G::World>,
    H: Hydrology,
{
    let mut world = generator.generate(w, h, seed, proc_cfg);

    simulator.reset_timer();
    for _ in 0..days {
        simulator.step_once(&mut world);
    }
    simulator.refresh_derived_stats(&mut world);

    let mut record = MineRecord {
        seed,
        w,
        h,
        stats: world.stats(),
        ..MineRecord::default()
    };

    compute_tile_counts(&world, &mut record);
    record.overlay_phash = compute_world_overlay_phash(&world);

    if hydrology_settings.enabled {
        let heights = extract_heights(&world);

        let sea = hydrology.sea_level_flood(&heights, w, h, hydrology_settings.sea_level, hydrology_settings.sea);
        record.sea_flood_cells = sea.flooded_cells;
        record.sea_max_depth = f64::from(sea.max_depth);
        record.sea_flood_frac = if w > 0 && h > 0 {
            f64::from(sea.flooded_cells) / (f64::from(w) * f64::from(h))
        } else {
            0.0
        };

        let drain_mask = build_water_drain_mask(&world);
        let dep = hydrology.fill_depressions(&heights, w, h, &drain_mask, hydrology_settings.depression);
        record.pond_cells = dep.filled_cells;
        record.pond_max_depth = f64::from(dep.max_depth);
        record.pond_volume = dep.volume;
        record.pond_frac = if w > 0 && h > 0 {
            f64::from(dep.filled_cells) / (f64::from(w) * f64::from(h))
        } else {
            0.0
        };
    }

    record.objective_score = compute_score(&record, weights);
    record.score = record.objective_score;

    if let Some(program) = score_expr {
        let evaluated = program.eval(&record).unwrap_or(f64::NAN);
        record.score = if evaluated.is_finite() {
            evaluated.clamp(-SCORE_CLAMP, SCORE_CLAMP)
        } else {
            SCORE_SENTINEL
        };
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MineObjective;

    #[test]
    fn balanced_score_rewards_population_and_happiness() {
        let mut record = MineRecord::default();
        record.stats.population = 1000;
        record.stats.happiness = 0.8;
        let weights = MineObjective::Balanced.weights();
        let score = compute_score(&record, &weights);
        assert!(score > 0.0);
    }

    #[test]
    fn chaos_rewards_flooding() {
        let mut flooded = MineRecord::default();
        flooded.sea_flood_frac = 0.5;
        flooded.pond_frac = 0.5;
        let dry = MineRecord::default();

        let weights = MineObjective::Chaos.weights();
        assert!(compute_score(&flooded, &weights) > compute_score(&dry, &weights));
    }

    #[test]
    fn score_scales_with_happy_scale_population_term() {
        let mut small = MineRecord::default();
        small.stats.population = 10;
        small.stats.happiness = 1.0;
        let mut large = small.clone();
        large.stats.population = 100_000;

        let weights = MineObjective::Balanced.weights();
        let small_score = compute_score(&small, &weights);
        let large_score = compute_score(&large, &weights);
        assert!(large_score > small_score);
    }
}
