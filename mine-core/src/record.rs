//! [`MineRecord`]: one mined candidate, and [`MineMetric`], the stable
//! metric accessor shared by ranking, analysis, and the expression VM.

use serde::{Deserialize, Serialize};

use crate::error::MineError;
use crate::sampler::normalize_key;
use crate::world::Stats;

/// A large finite sentinel used in place of `+∞` so exported artifacts
/// (CSV/JSON) stay portable across readers that reject IEEE infinities.
pub const CROWDING_INFINITY: f64 = 1.0e30;

/// One sampled-and-simulated candidate seed.
///
/// Immutable after [`crate::mine_one::mine_one`] produces it, except for the
/// analysis-set fields (`pareto_rank`, `pareto_crowding`, `outlier_lof`,
/// `novelty`), which downstream analyses fill in.
#[derive(Clone, Debug, PartialEq)]
pub struct MineRecord {
    /// World seed this record was generated from.
    pub seed: u64,
    /// World width in tiles.
    pub w: i32,
    /// World height in tiles.
    pub h: i32,
    /// KPI snapshot taken after simulation.
    pub stats: Stats,

    /// Tile counters.
    pub water_tiles: i32,
    /// Tile counters.
    pub road_tiles: i32,
    /// Tile counters.
    pub res_tiles: i32,
    /// Tile counters.
    pub com_tiles: i32,
    /// Tile counters.
    pub ind_tiles: i32,
    /// Tile counters.
    pub park_tiles: i32,
    /// Tile counters.
    pub school_tiles: i32,
    /// Tile counters.
    pub hospital_tiles: i32,
    /// Tile counters.
    pub police_tiles: i32,
    /// Tile counters.
    pub fire_tiles: i32,

    /// Water tile fraction of the world area.
    pub water_frac: f64,
    /// Road tile fraction of the world area.
    pub road_frac: f64,
    /// Zoned (res+com+ind) tile fraction of the world area.
    pub zone_frac: f64,
    /// Park tile fraction of the world area.
    pub park_frac: f64,

    /// Number of cells classified as sea-flooded.
    pub sea_flood_cells: i32,
    /// Sea-flooded fraction of the world area.
    pub sea_flood_frac: f64,
    /// Maximum sea-flood depth.
    pub sea_max_depth: f64,

    /// Number of cells classified as ponded.
    pub pond_cells: i32,
    /// Ponded fraction of the world area.
    pub pond_frac: f64,
    /// Maximum pond depth.
    pub pond_max_depth: f64,
    /// Total ponded volume.
    pub pond_volume: f64,

    /// Raw objective score from [`crate::mine_one::compute_score`].
    pub objective_score: f64,
    /// Final ranking score: `objective_score` unless a score expression
    /// overrides it.
    pub score: f64,

    /// 64-bit perceptual layout fingerprint.
    pub overlay_phash: u64,

    /// Pareto front index; `-1` until a Pareto analysis has run.
    pub pareto_rank: i32,
    /// NSGA-II crowding distance; meaningless until a Pareto analysis has run.
    pub pareto_crowding: f64,
    /// Local Outlier Factor; meaningless until an outlier analysis has run.
    pub outlier_lof: f64,
    /// Mean distance to the k nearest neighbours; meaningless until an
    /// outlier analysis has run.
    pub novelty: f64,
}

impl Default for MineRecord {
    fn default() -> Self {
        Self {
            seed: 0,
            w: 0,
            h: 0,
            stats: Stats::default(),
            water_tiles: 0,
            road_tiles: 0,
            res_tiles: 0,
            com_tiles: 0,
            ind_tiles: 0,
            park_tiles: 0,
            school_tiles: 0,
            hospital_tiles: 0,
            police_tiles: 0,
            fire_tiles: 0,
            water_frac: 0.0,
            road_frac: 0.0,
            zone_frac: 0.0,
            park_frac: 0.0,
            sea_flood_cells: 0,
            sea_flood_frac: 0.0,
            sea_max_depth: 0.0,
            pond_cells: 0,
            pond_frac: 0.0,
            pond_max_depth: 0.0,
            pond_volume: 0.0,
            objective_score: 0.0,
            score: 0.0,
            overlay_phash: 0,
            pareto_rank: -1,
            pareto_crowding: 0.0,
            outlier_lof: 0.0,
            novelty: 0.0,
        }
    }
}

impl MineRecord {
    /// World area, floored at 1 to keep per-area ratios finite for degenerate sizes.
    #[must_use]
    pub fn area(&self) -> f64 {
        (f64::from(self.w) * f64::from(self.h)).max(1.0)
    }

    /// `population / area`.
    #[must_use]
    pub fn pop_density(&self) -> f64 {
        f64::from(self.stats.population) / self.area()
    }

    /// `road_tiles / area`.
    #[must_use]
    pub fn road_density(&self) -> f64 {
        f64::from(self.road_tiles) / self.area()
    }

    /// `zone_frac`, already an area-normalized fraction.
    #[must_use]
    pub fn zone_density(&self) -> f64 {
        self.zone_frac
    }

    /// Derived composite flood-risk metric used by the expression VM and
    /// several analyses: `sea_flood_frac + pond_frac + 0.25*(sea_max_depth + pond_max_depth)`.
    #[must_use]
    pub fn flood_risk(&self) -> f64 {
        self.sea_flood_frac + self.pond_frac + 0.25 * (self.sea_max_depth + self.pond_max_depth)
    }
}

/// Stable accessor identifying a scalar field of [`MineRecord`], shared by
/// Pareto objectives, MAP-Elites axes, outlier/clustering/embedding/neighbor
/// feature lists, and the expression VM's variable lookup.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MineMetric {
    /// [`Stats::population`].
    Population,
    /// [`Stats::happiness`].
    Happiness,
    /// [`Stats::money`].
    Money,
    /// [`Stats::avg_land_value`].
    AvgLandValue,
    /// [`Stats::traffic_congestion`].
    TrafficCongestion,
    /// [`Stats::goods_satisfaction`].
    GoodsSatisfaction,
    /// [`Stats::services_overall_satisfaction`].
    ServicesOverallSatisfaction,
    /// [`MineRecord::pop_density`].
    PopDensity,
    /// [`MineRecord::road_density`].
    RoadDensity,
    /// [`MineRecord::zone_density`].
    ZoneDensity,
    /// [`MineRecord::water_frac`].
    WaterFrac,
    /// [`MineRecord::road_frac`].
    RoadFrac,
    /// [`MineRecord::zone_frac`].
    ZoneFrac,
    /// [`MineRecord::park_frac`].
    ParkFrac,
    /// [`MineRecord::sea_flood_frac`].
    SeaFloodFrac,
    /// [`MineRecord::sea_max_depth`].
    SeaMaxDepth,
    /// [`MineRecord::pond_frac`].
    PondFrac,
    /// [`MineRecord::pond_max_depth`].
    PondMaxDepth,
    /// [`MineRecord::flood_risk`].
    FloodRisk,
    /// [`MineRecord::score`].
    Score,
    /// [`MineRecord::objective_score`].
    ObjectiveScore,
}

impl MineMetric {
    /// Returns the canonical lower-case name used in configuration and the
    /// expression VM's primary variable alias.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::Happiness => "happiness",
            Self::Money => "money",
            Self::AvgLandValue => "avg_land_value",
            Self::TrafficCongestion => "traffic_congestion",
            Self::GoodsSatisfaction => "goods_satisfaction",
            Self::ServicesOverallSatisfaction => "services_overall_satisfaction",
            Self::PopDensity => "pop_density",
            Self::RoadDensity => "road_density",
            Self::ZoneDensity => "zone_density",
            Self::WaterFrac => "water_frac",
            Self::RoadFrac => "road_frac",
            Self::ZoneFrac => "zone_frac",
            Self::ParkFrac => "park_frac",
            Self::SeaFloodFrac => "sea_flood_frac",
            Self::SeaMaxDepth => "sea_max_depth",
            Self::PondFrac => "pond_frac",
            Self::PondMaxDepth => "pond_max_depth",
            Self::FloodRisk => "flood_risk",
            Self::Score => "score",
            Self::ObjectiveScore => "objective_score",
        }
    }

    /// Parses a metric name, accepting common aliases.
    ///
    /// # Errors
    /// Returns [`MineError::UnknownEnumValue`] when `s` matches no alias.
    pub fn parse(s: &str) -> Result<Self, MineError> {
        let key = normalize_key(s);
        let metric = match key.as_str() {
            "population" | "pop" => Self::Population,
            "happiness" => Self::Happiness,
            "money" => Self::Money,
            "avg_land_value" | "avglandvalue" | "land_value" => Self::AvgLandValue,
            "traffic_congestion" | "traffic" | "congestion" => Self::TrafficCongestion,
            "goods_satisfaction" | "goods" => Self::GoodsSatisfaction,
            "services_overall_satisfaction" | "services_satisfaction" | "services" => {
                Self::ServicesOverallSatisfaction
            }
            "pop_density" | "population_density" => Self::PopDensity,
            "road_density" => Self::RoadDensity,
            "zone_density" => Self::ZoneDensity,
            "water_frac" | "water_fraction" => Self::WaterFrac,
            "road_frac" | "road_fraction" => Self::RoadFrac,
            "zone_frac" | "zone_fraction" => Self::ZoneFrac,
            "park_frac" | "park_fraction" => Self::ParkFrac,
            "sea_flood_frac" => Self::SeaFloodFrac,
            "sea_max_depth" => Self::SeaMaxDepth,
            "pond_frac" => Self::PondFrac,
            "pond_max_depth" => Self::PondMaxDepth,
            "flood_risk" => Self::FloodRisk,
            "score" => Self::Score,
            "objective_score" | "objective" => Self::ObjectiveScore,
            _ => {
                return Err(MineError::UnknownEnumValue {
                    kind: "metric",
                    value: s.to_owned(),
                });
            }
        };
        Ok(metric)
    }

    /// Reads this metric's value off `record`.
    #[must_use]
    pub fn value(self, record: &MineRecord) -> f64 {
        match self {
            Self::Population => f64::from(record.stats.population),
            Self::Happiness => f64::from(record.stats.happiness),
            Self::Money => record.stats.money,
            Self::AvgLandValue => f64::from(record.stats.avg_land_value),
            Self::TrafficCongestion => f64::from(record.stats.traffic_congestion),
            Self::GoodsSatisfaction => f64::from(record.stats.goods_satisfaction),
            Self::ServicesOverallSatisfaction => {
                f64::from(record.stats.services_overall_satisfaction)
            }
            Self::PopDensity => record.pop_density(),
            Self::RoadDensity => record.road_density(),
            Self::ZoneDensity => record.zone_density(),
            Self::WaterFrac => record.water_frac,
            Self::RoadFrac => record.road_frac,
            Self::ZoneFrac => record.zone_frac,
            Self::ParkFrac => record.park_frac,
            Self::SeaFloodFrac => record.sea_flood_frac,
            Self::SeaMaxDepth => record.sea_max_depth,
            Self::PondFrac => record.pond_frac,
            Self::PondMaxDepth => record.pond_max_depth,
            Self::FloodRisk => record.flood_risk(),
            Self::Score => record.score,
            Self::ObjectiveScore => record.objective_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_has_unranked_pareto_fields() {
        let record = MineRecord::default();
        assert_eq!(record.pareto_rank, -1);
    }

    #[test]
    fn area_is_floored_at_one() {
        let mut record = MineRecord::default();
        record.w = 0;
        record.h = 0;
        assert_eq!(record.area(), 1.0);
    }

    #[test]
    fn metric_parse_roundtrips_every_variant() {
        let all = [
            MineMetric::Population,
            MineMetric::Happiness,
            MineMetric::Money,
            MineMetric::AvgLandValue,
            MineMetric::TrafficCongestion,
            MineMetric::GoodsSatisfaction,
            MineMetric::ServicesOverallSatisfaction,
            MineMetric::PopDensity,
            MineMetric::RoadDensity,
            MineMetric::ZoneDensity,
            MineMetric::WaterFrac,
            MineMetric::RoadFrac,
            MineMetric::ZoneFrac,
            MineMetric::ParkFrac,
            MineMetric::SeaFloodFrac,
            MineMetric::SeaMaxDepth,
            MineMetric::PondFrac,
            MineMetric::PondMaxDepth,
            MineMetric::FloodRisk,
            MineMetric::Score,
            MineMetric::ObjectiveScore,
        ];
        for metric in all {
            assert_eq!(MineMetric::parse(metric.name()).unwrap(), metric);
        }
    }

    #[test]
    fn flood_risk_combines_frac_and_depth() {
        let mut record = MineRecord::default();
        record.sea_flood_frac = 0.1;
        record.pond_frac = 0.2;
        record.sea_max_depth = 1.0;
        record.pond_max_depth = 1.0;
        assert!((record.flood_risk() - (0.1 + 0.2 + 0.25 * 2.0)).abs() < 1e-12);
    }
}
