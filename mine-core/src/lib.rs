//! Procedural-city seed-mining core.
//!
//! This crate is host-agnostic: it knows nothing about how worlds are
//! generated, simulated, or flooded. A host application supplies those
//! through the [`world`] traits; this crate supplies deterministic sampling,
//! scoring, selection, and analysis on top.

pub mod checkpoint;
pub mod clustering;
pub mod config;
pub mod csv_export;
pub mod distance_space;
pub mod embedding;
pub mod error;
pub mod expr;
pub mod map_elites;
pub mod mine_one;
pub mod miner;
pub mod neighbors;
pub mod outlier;
pub mod pareto;
pub mod phash;
pub mod record;
pub mod sampler;
pub mod selection;
pub mod vptree;
pub mod world;

pub use crate::checkpoint::{
    CheckpointHeader, CheckpointWriter, LoadedCheckpoint, StageRecords, SuccessiveHalvingSchedule,
    SuccessiveHalvingStage, configs_match, load_checkpoint,
};
pub use crate::clustering::{ClusteringConfig, ClusteringResult, compute_clustering};
pub use crate::config::{MineConfig, MineObjective, ScoreWeights};
pub use crate::csv_export::write_records_csv;
pub use crate::distance_space::{DistanceSpace, DistanceSpaceConfig, MineDiversityMode};
pub use crate::embedding::{EmbeddingResult, compute_embedding};
pub use crate::error::{MineError, MineErrorCode, Result};
pub use crate::expr::Program;
pub use crate::map_elites::{
    MapElitesAxis, MapElitesConfig, MapElitesResult, compute_map_elites, select_top_map_elites_indices,
};
pub use crate::mine_one::{HydrologySettings, SCORE_SENTINEL, compute_score, mine_one};
pub use crate::miner::{MineProgress, MineSession, mine_seeds, mine_seeds_explicit};
pub use crate::neighbors::{NeighborGraph, compute_neighbor_graph};
pub use crate::outlier::{OutlierConfig, OutlierResult, compute_outliers, select_top_outlier_indices};
pub use crate::pareto::{ParetoObjective, ParetoResult, compute_pareto, select_top_pareto_indices};
pub use crate::phash::{PHashOptions, compute_world_overlay_phash, hamming_distance_64};
pub use crate::record::{CROWDING_INFINITY, MineMetric, MineRecord};
pub use crate::sampler::{SeedPlan, SeedSampler, seed_for_sample};
pub use crate::selection::{MmrConfig, select_diverse_top_k};
pub use crate::vptree::{Neighbour, VpTree};
pub use crate::world::{
    DepressionFillConfig, DepressionFillResult, Hydrology, Overlay, SeaFloodConfig,
    SeaFloodResult, Simulator, Stats, Terrain, Tile, World, WorldGenerator,
};
