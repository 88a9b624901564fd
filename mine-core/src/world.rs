//! Contracts consumed from the world generator, simulator, and hydrology
//! collaborators.
//!
//! This module deliberately contains no generation, simulation, or hydrology
//! *logic*. It names the shapes the mining core depends on so a host
//! application can plug in its own `GenerateWorld`, `Simulator`, and
//! flood/depression routines. The mining core is generic over these traits.

use serde::{Deserialize, Serialize};

/// Base terrain of a tile. Built overlays sit on top of terrain.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Terrain {
    /// Open water.
    Water,
    /// Coastal/riverine sand.
    Sand,
    /// Buildable dry land.
    Grass,
}

/// Zoning or civic overlay placed on top of a tile's terrain.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Overlay {
    /// No overlay; bare terrain.
    None,
    /// Public park.
    Park,
    /// Road network tile.
    Road,
    /// Residential zoning.
    Residential,
    /// Commercial zoning.
    Commercial,
    /// Industrial zoning.
    Industrial,
    /// School civic building.
    School,
    /// Hospital civic building.
    Hospital,
    /// Police station civic building.
    PoliceStation,
    /// Fire station civic building.
    FireStation,
}

/// One cell of the simulated world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    /// Base terrain.
    pub terrain: Terrain,
    /// Zoning/civic overlay, if any.
    pub overlay: Overlay,
    /// Normalized elevation in `[0, 1]`.
    pub height: f32,
    /// Development level in `[1, 3]` for built overlays; meaningless otherwise.
    pub level: i32,
    /// Current occupant count (population/jobs depending on overlay).
    pub occupants: i32,
    /// District identifier this tile is assigned to.
    pub district: i32,
}

/// Snapshot of city-wide KPIs exposed by the simulator.
///
/// Field shape is stable: the expression VM and score function both index
/// into it by name.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stats {
    /// Simulated day index at the time of the snapshot.
    pub day: i32,
    /// Total resident population.
    pub population: i32,
    /// Mean resident happiness, roughly in `[0, 1]`.
    pub happiness: f32,
    /// Treasury balance.
    pub money: f64,
    /// Mean land value across developed tiles.
    pub avg_land_value: f32,
    /// Mean traffic congestion, roughly in `[0, 1]`.
    pub traffic_congestion: f32,
    /// Mean goods-delivery satisfaction, roughly in `[0, 1]`.
    pub goods_satisfaction: f32,
    /// Mean overall satisfaction with civic services, roughly in `[0, 1]`.
    pub services_overall_satisfaction: f32,
}

/// A finished, queryable procedural world.
///
/// Implemented by the host's world-generation layer; the mining core only
/// reads through this trait.
pub trait World {
    /// World width in tiles.
    fn width(&self) -> i32;
    /// World height in tiles.
    fn height(&self) -> i32;
    /// Reads the tile at `(x, y)`. Callers never pass out-of-range coordinates.
    fn at(&self, x: i32, y: i32) -> Tile;
    /// Returns the current KPI snapshot.
    fn stats(&self) -> Stats;
}

/// Deterministic procedural generation, consumed as an external collaborator.
///
/// `w`/`h` are validated by the mining core before this is called; `seed` and
/// `proc_cfg` fully determine the output.
pub trait WorldGenerator {
    /// Concrete world type produced by this generator.
    type World: World;
    /// Procedural generation configuration type, opaque to the mining core
    /// beyond being `Clone` and comparable for checkpoint resume.
    type ProcConfig: Clone;

    /// Deterministically generates a world of size `w`×`h` from `seed`.
    fn generate(&self, w: i32, h: i32, seed: u64, proc_cfg: &Self::ProcConfig) -> Self::World;
}

/// Per-day city simulation, reused across seeds by a single worker.
///
/// Implementations are not required to be `Send`/`Sync`; the miner gives each
/// worker thread its own instance (§5).
pub trait Simulator<W: World> {
    /// Resets any internal time accumulator so successive worlds start fresh.
    fn reset_timer(&mut self);
    /// Advances the simulation by exactly one day.
    fn step_once(&mut self, world: &mut W);
    /// Recomputes derived statistics without advancing time. Called once after
    /// the day loop so `days == 0` runs still produce sane stats.
    fn refresh_derived_stats(&mut self, world: &mut W);
}

/// Configuration for the coastal sea-level flood routine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeaFloodConfig {
    /// Only count cells connected to the map edge through flooded cells.
    pub require_edge_connection: bool,
    /// Use 8-neighbourhood connectivity instead of 4-neighbourhood.
    pub eight_connected: bool,
}

/// Result of a coastal sea-level flood computation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeaFloodResult {
    /// Width the result was computed over; must equal the query's `w`.
    pub w: i32,
    /// Height the result was computed over; must equal the query's `h`.
    pub h: i32,
    /// Number of cells classified as flooded.
    pub flooded_cells: i32,
    /// Maximum flood depth across all cells.
    pub max_depth: f32,
}

/// Configuration for Priority-Flood depression filling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepressionFillConfig {
    /// Treat every map-edge cell as a drainage outlet.
    pub include_edges: bool,
    /// Minimum lift applied above a processed cell when filling a lower neighbour.
    pub epsilon: f32,
}

impl Default for DepressionFillConfig {
    fn default() -> Self {
        Self {
            include_edges: true,
            epsilon: 0.0,
        }
    }
}

/// Result of a Priority-Flood depression-filling pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DepressionFillResult {
    /// Width the result was computed over; must equal the query's `w`.
    pub w: i32,
    /// Height the result was computed over; must equal the query's `h`.
    pub h: i32,
    /// Number of cells with positive fill depth.
    pub filled_cells: i32,
    /// Maximum fill depth across all cells.
    pub max_depth: f32,
    /// Total fill volume, summed over all cells.
    pub volume: f64,
}

/// Hydrology routines consumed by [`crate::mine_one`].
///
/// A host application implements this once over its terrain representation;
/// the mining core treats both routines as pure functions of a heightfield.
pub trait Hydrology {
    /// Computes a coastal flood mask and its aggregates for `sea_level`.
    ///
    /// `heights` is row-major, length `w as usize * h as usize`.
    fn sea_level_flood(
        &self,
        heights: &[f32],
        w: i32,
        h: i32,
        sea_level: f32,
        cfg: SeaFloodConfig,
    ) -> SeaFloodResult;

    /// Fills depressions in `heights`, treating any non-zero `drain_mask` cell
    /// as an additional outlet (typically existing water bodies).
    ///
    /// `heights` and `drain_mask` are row-major, length `w as usize * h as usize`.
    fn fill_depressions(
        &self,
        heights: &[f32],
        w: i32,
        h: i32,
        drain_mask: &[u8],
        cfg: DepressionFillConfig,
    ) -> DepressionFillResult;
}
