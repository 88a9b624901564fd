//! Append-only JSON-Lines checkpoint format for flat and staged
//! (successive-halving) mining runs.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{MineConfig, MineObjective};
use crate::distance_space::MineDiversityMode;
use crate::error::{MineError, Result};
use crate::record::MineRecord;
use crate::sampler::SeedSampler;
use crate::world::Stats;

const HEADER_TYPE_FLAT: &str = "procisocity_mine_checkpoint";
const HEADER_TYPE_STAGED: &str = "procisocity_mine_checkpoint_sh";
const CHECKPOINT_VERSION: u32 = 1;

/// One stage of a successive-halving schedule.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuccessiveHalvingStage {
    /// Days simulated per candidate during this stage.
    pub days: i32,
    /// Candidates retained for the next stage.
    pub keep: usize,
}

/// Successive-halving selection schedule recorded in a staged header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuccessiveHalvingSchedule {
    /// Ordered stages.
    pub stages: Vec<SuccessiveHalvingStage>,
    /// Whether MMR diversification runs between stages.
    pub diverse: bool,
    /// MMR candidate pool size.
    pub candidate_pool: usize,
    /// MMR score/diversity balance.
    pub mmr_score_weight: f64,
    /// MMR distance-space mode.
    pub diversity_mode: MineDiversityMode,
    /// MMR hybrid blend weight.
    pub layout_weight: f64,
}

/// A parsed checkpoint header. `proc`/`sim` are kept as opaque JSON since
/// the mining core has no knowledge of the host's config types.
#[derive(Clone, Debug)]
pub struct CheckpointHeader {
    /// Checkpoint format version.
    pub version: u32,
    /// Run configuration this checkpoint was produced under.
    pub mine: MineConfig,
    /// Host procedural-generation configuration, as written.
    pub proc: Value,
    /// Host simulation configuration, as written.
    pub sim: Value,
    /// Present only for staged checkpoints.
    pub sh: Option<SuccessiveHalvingSchedule>,
}

/// Records recovered for one stage (stage `0` for flat checkpoints).
#[derive(Clone, Debug, Default)]
pub struct StageRecords {
    /// Records indexed by sample index, resized to `max_index + 1` and
    /// filled with defaults at gaps.
    pub records: Vec<MineRecord>,
    /// `have_index[i]` is `true` when `records[i]` was present in the file.
    pub have_index: Vec<bool>,
}

/// A fully loaded checkpoint.
#[derive(Clone, Debug)]
pub struct LoadedCheckpoint {
    /// The parsed header.
    pub header: CheckpointHeader,
    /// Per-stage records; flat checkpoints populate only index `0`.
    pub stages: Vec<StageRecords>,
}

fn mine_config_to_json(cfg: &MineConfig) -> Value {
    json!({
        "seedStart": cfg.seed_start,
        "seedStartHex": format!("0x{:016x}", cfg.seed_start),
        "seedStep": cfg.seed_step,
        "seedStepHex": format!("0x{:016x}", cfg.seed_step),
        "seedXor": cfg.seed_xor,
        "seedSampler": cfg.seed_sampler.name(),
        "samples": cfg.samples,
        "w": cfg.w,
        "h": cfg.h,
        "days": cfg.days,
        "threads": cfg.threads,
        "objective": cfg.objective.name(),
        "scoreExpr": cfg.score_expr,
        "hydrologyEnabled": cfg.hydrology_enabled,
        "seaLevelOverride": if cfg.sea_level_override.is_finite() {
            json!(cfg.sea_level_override)
        } else {
            Value::Null
        },
        "seaRequireEdgeConnection": cfg.sea_require_edge_connection,
        "seaEightConnected": cfg.sea_eight_connected,
        "depressionEpsilon": cfg.depression_epsilon,
    })
}

fn parse_u64_field(obj: &Value, hex_key: &str, number_key: &str, line: usize) -> Result<u64> {
    if let Some(hex) = obj.get(hex_key).and_then(Value::as_str) {
        let trimmed = hex.strip_prefix("0x").unwrap_or(hex);
        return u64::from_str_radix(trimmed, 16).map_err(|e| MineError::CheckpointParseFailure {
            line,
            message: format!("invalid {hex_key}: {e}"),
        });
    }
    obj.get(number_key)
        .and_then(Value::as_u64)
        .ok_or_else(|| MineError::CheckpointParseFailure {
            line,
            message: format!("missing {number_key}"),
        })
}

fn mine_config_from_json(obj: &Value, line: usize) -> Result<MineConfig> {
    let missing = |field: &'static str| MineError::CheckpointParseFailure {
        line,
        message: format!("missing field `{field}`"),
    };

    let seed_start = parse_u64_field(obj, "seedStartHex", "seedStart", line)?;
    let seed_step = parse_u64_field(obj, "seedStepHex", "seedStep", line)?;
    let seed_xor = obj.get("seedXor").and_then(Value::as_u64).unwrap_or(0);
    let seed_sampler_name = obj.get("seedSampler").and_then(Value::as_str).ok_or_else(|| missing("seedSampler"))?;
    let seed_sampler = SeedSampler::parse(seed_sampler_name)?;
    let objective_name = obj.get("objective").and_then(Value::as_str).ok_or_else(|| missing("objective"))?;
    let objective = MineObjective::parse(objective_name)?;

    let sea_level_override = match obj.get("seaLevelOverride") {
        Some(Value::Null) | None => f32::NAN,
        #[allow(clippy::cast_possible_truncation)]
        Some(v) => v.as_f64().ok_or_else(|| missing("seaLevelOverride"))? as f32,
    };

    Ok(MineConfig {
        seed_start,
        seed_step,
        seed_xor,
        seed_sampler,
        samples: obj.get("samples").and_then(Value::as_i64).ok_or_else(|| missing("samples"))? as i32,
        w: obj.get("w").and_then(Value::as_i64).ok_or_else(|| missing("w"))? as i32,
        h: obj.get("h").and_then(Value::as_i64).ok_or_else(|| missing("h"))? as i32,
        days: obj.get("days").and_then(Value::as_i64).ok_or_else(|| missing("days"))? as i32,
        threads: obj.get("threads").and_then(Value::as_i64).unwrap_or(1) as i32,
        objective,
        score_expr: obj.get("scoreExpr").and_then(Value::as_str).unwrap_or_default().to_owned(),
        hydrology_enabled: obj.get("hydrologyEnabled").and_then(Value::as_bool).unwrap_or(true),
        sea_level_override,
        sea_require_edge_connection: obj.get("seaRequireEdgeConnection").and_then(Value::as_bool).unwrap_or(true),
        sea_eight_connected: obj.get("seaEightConnected").and_then(Value::as_bool).unwrap_or(false),
        #[allow(clippy::cast_possible_truncation)]
        depression_epsilon: obj.get("depressionEpsilon").and_then(Value::as_f64).unwrap_or(0.0) as f32,
    })
}

fn stats_to_json(stats: &Stats) -> Value {
    json!({
        "day": stats.day,
        "population": stats.population,
        "happiness": stats.happiness,
        "money": stats.money,
        "avgLandValue": stats.avg_land_value,
        "trafficCongestion": stats.traffic_congestion,
        "goodsSatisfaction": stats.goods_satisfaction,
        "servicesOverallSatisfaction": stats.services_overall_satisfaction,
    })
}

fn stats_from_json(obj: &Value, line: usize) -> Result<Stats> {
    let missing = |field: &'static str| MineError::CheckpointParseFailure {
        line,
        message: format!("missing stats field `{field}`"),
    };
    Ok(Stats {
        day: obj.get("day").and_then(Value::as_i64).ok_or_else(|| missing("day"))? as i32,
        population: obj.get("population").and_then(Value::as_i64).ok_or_else(|| missing("population"))? as i32,
        #[allow(clippy::cast_possible_truncation)]
        happiness: obj.get("happiness").and_then(Value::as_f64).ok_or_else(|| missing("happiness"))? as f32,
        money: obj.get("money").and_then(Value::as_f64).ok_or_else(|| missing("money"))?,
        #[allow(clippy::cast_possible_truncation)]
        avg_land_value: obj.get("avgLandValue").and_then(Value::as_f64).ok_or_else(|| missing("avgLandValue"))? as f32,
        #[allow(clippy::cast_possible_truncation)]
        traffic_congestion: obj
            .get("trafficCongestion")
            .and_then(Value::as_f64)
            .ok_or_else(|| missing("trafficCongestion"))? as f32,
        #[allow(clippy::cast_possible_truncation)]
        goods_satisfaction: obj
            .get("goodsSatisfaction")
            .and_then(Value::as_f64)
            .ok_or_else(|| missing("goodsSatisfaction"))? as f32,
        #[allow(clippy::cast_possible_truncation)]
        services_overall_satisfaction: obj
            .get("servicesOverallSatisfaction")
            .and_then(Value::as_f64)
            .ok_or_else(|| missing("servicesOverallSatisfaction"))? as f32,
    })
}

fn record_to_json(record: &MineRecord) -> Value {
    json!({
        "seed": record.seed,
        "seedHex": format!("0x{:016x}", record.seed),
        "w": record.w,
        "h": record.h,
        "score": record.score,
        "objectiveScore": record.objective_score,
        "overlayPHash": record.overlay_phash,
        "overlayPHashHex": format!("0x{:016x}", record.overlay_phash),
        "paretoRank": record.pareto_rank,
        "paretoCrowding": record.pareto_crowding,
        "outlierLof": record.outlier_lof,
        "novelty": record.novelty,
        "stats": stats_to_json(&record.stats),
        "tiles": {
            "roadTiles": record.road_tiles,
            "waterTiles": record.water_tiles,
            "resTiles": record.res_tiles,
            "comTiles": record.com_tiles,
            "indTiles": record.ind_tiles,
            "parkTiles": record.park_tiles,
            "schoolTiles": record.school_tiles,
            "hospitalTiles": record.hospital_tiles,
            "policeTiles": record.police_tiles,
            "fireTiles": record.fire_tiles,
            "waterFrac": record.water_frac,
            "roadFrac": record.road_frac,
            "zoneFrac": record.zone_frac,
            "parkFrac": record.park_frac,
        },
        "hydrology": {
            "seaFloodCells": record.sea_flood_cells,
            "seaFloodFrac": record.sea_flood_frac,
            "seaMaxDepth": record.sea_max_depth,
            "pondCells": record.pond_cells,
            "pondFrac": record.pond_frac,
            "pondMaxDepth": record.pond_max_depth,
            "pondVolume": record.pond_volume,
        },
    })
}

fn record_from_json(value: &Value, line: usize) -> Result<MineRecord> {
    let missing = |field: &'static str| MineError::CheckpointParseFailure {
        line,
        message: format!("missing record field `{field}`"),
    };
    let tiles = value.get("tiles").ok_or_else(|| missing("tiles"))?;
    let hydro = value.get("hydrology").ok_or_else(|| missing("hydrology"))?;
    let stats = stats_from_json(value.get("stats").ok_or_else(|| missing("stats"))?, line)?;

    let seed = parse_u64_field(value, "seedHex", "seed", line)?;
    let overlay_phash = parse_u64_field(value, "overlayPHashHex", "overlayPHash", line)?;

    Ok(MineRecord {
        seed,
        w: value.get("w").and_then(Value::as_i64).ok_or_else(|| missing("w"))? as i32,
        h: value.get("h").and_then(Value::as_i64).ok_or_else(|| missing("h"))? as i32,
        stats,
        water_tiles: tiles.get("waterTiles").and_then(Value::as_i64).unwrap_or(0) as i32,
        road_tiles: tiles.get("roadTiles").and_then(Value::as_i64).unwrap_or(0) as i32,
        res_tiles: tiles.get("resTiles").and_then(Value::as_i64).unwrap_or(0) as i32,
        com_tiles: tiles.get("comTiles").and_then(Value::as_i64).unwrap_or(0) as i32,
        ind_tiles: tiles.get("indTiles").and_then(Value::as_i64).unwrap_or(0) as i32,
        park_tiles: tiles.get("parkTiles").and_then(Value::as_i64).unwrap_or(0) as i32,
        school_tiles: tiles.get("schoolTiles").and_then(Value::as_i64).unwrap_or(0) as i32,
        hospital_tiles: tiles.get("hospitalTiles").and_then(Value::as_i64).unwrap_or(0) as i32,
        police_tiles: tiles.get("policeTiles").and_then(Value::as_i64).unwrap_or(0) as i32,
        fire_tiles: tiles.get("fireTiles").and_then(Value::as_i64).unwrap_or(0) as i32,
        water_frac: tiles.get("waterFrac").and_then(Value::as_f64).unwrap_or(0.0),
        road_frac: tiles.get("roadFrac").and_then(Value::as_f64).unwrap_or(0.0),
        zone_frac: tiles.get("zoneFrac").and_then(Value::as_f64).unwrap_or(0.0),
        park_frac: tiles.get("parkFrac").and_then(Value::as_f64).unwrap_or(0.0),
        sea_flood_cells: hydro.get("seaFloodCells").and_then(Value::as_i64).unwrap_or(0) as i32,
        sea_flood_frac: hydro.get("seaFloodFrac").and_then(Value::as_f64).unwrap_or(0.0),
        sea_max_depth: hydro.get("seaMaxDepth").and_then(Value::as_f64).unwrap_or(0.0),
        pond_cells: hydro.get("pondCells").and_then(Value::as_i64).unwrap_or(0) as i32,
        pond_frac: hydro.get("pondFrac").and_then(Value::as_f64).unwrap_or(0.0),
        pond_max_depth: hydro.get("pondMaxDepth").and_then(Value::as_f64).unwrap_or(0.0),
        pond_volume: hydro.get("pondVolume").and_then(Value::as_f64).unwrap_or(0.0),
        objective_score: value.get("objectiveScore").and_then(Value::as_f64).ok_or_else(|| missing("objectiveScore"))?,
        score: value.get("score").and_then(Value::as_f64).ok_or_else(|| missing("score"))?,
        overlay_phash,
        pareto_rank: value.get("paretoRank").and_then(Value::as_i64).unwrap_or(-1) as i32,
        pareto_crowding: value.get("paretoCrowding").and_then(Value::as_f64).unwrap_or(0.0),
        outlier_lof: value.get("outlierLof").and_then(Value::as_f64).unwrap_or(0.0),
        novelty: value.get("novelty").and_then(Value::as_f64).unwrap_or(0.0),
    })
}

/// Appends checkpoint lines to an underlying writer, one `write()` per line
/// so a crash mid-write never corrupts a previously completed line.
pub struct CheckpointWriter<W: Write> {
    inner: W,
}

impl<W: Write> CheckpointWriter<W> {
    /// Wraps `inner` for checkpoint writing.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    fn write_line(&mut self, value: &Value) -> Result<()> {
        let mut line = serde_json::to_string(value).map_err(|e| MineError::Io {
            source: std::io::Error::other(e),
        })?;
        line.push('\n');
        self.inner.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Writes a flat checkpoint header.
    pub fn write_header(&mut self, mine: &MineConfig, proc: &impl Serialize, sim: &impl Serialize) -> Result<()> {
        let proc_value = serde_json::to_value(proc).map_err(|e| MineError::Io { source: std::io::Error::other(e) })?;
        let sim_value = serde_json::to_value(sim).map_err(|e| MineError::Io { source: std::io::Error::other(e) })?;
        self.write_line(&json!({
            "type": HEADER_TYPE_FLAT,
            "version": CHECKPOINT_VERSION,
            "mine": mine_config_to_json(mine),
            "proc": proc_value,
            "sim": sim_value,
        }))
    }

    /// Writes a staged (successive-halving) checkpoint header.
    pub fn write_staged_header(
        &mut self,
        mine: &MineConfig,
        proc: &impl Serialize,
        sim: &impl Serialize,
        sh: &SuccessiveHalvingSchedule,
    ) -> Result<()> {
        let proc_value = serde_json::to_value(proc).map_err(|e| MineError::Io { source: std::io::Error::other(e) })?;
        let sim_value = serde_json::to_value(sim).map_err(|e| MineError::Io { source: std::io::Error::other(e) })?;
        let sh_value = serde_json::to_value(sh).map_err(|e| MineError::Io { source: std::io::Error::other(e) })?;
        self.write_line(&json!({
            "type": HEADER_TYPE_STAGED,
            "version": CHECKPOINT_VERSION,
            "mine": mine_config_to_json(mine),
            "proc": proc_value,
            "sim": sim_value,
            "sh": sh_value,
        }))
    }

    /// Appends a flat record line.
    pub fn write_record(&mut self, index: usize, record: &MineRecord) -> Result<()> {
        self.write_line(&json!({
            "type": "record",
            "index": index,
            "record": record_to_json(record),
        }))
    }

    /// Appends a staged record line.
    pub fn write_staged_record(&mut self, stage: usize, index: usize, record: &MineRecord) -> Result<()> {
        self.write_line(&json!({
            "type": "record",
            "stage": stage,
            "index": index,
            "record": record_to_json(record),
        }))
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

fn parse_header_line(value: &Value, line: usize) -> Result<CheckpointHeader> {
    let type_str = value.get("type").and_then(Value::as_str).unwrap_or("");
    if type_str != HEADER_TYPE_FLAT && type_str != HEADER_TYPE_STAGED {
        return Err(MineError::CheckpointWrongType {
            line,
            found: type_str.to_owned(),
            expected: HEADER_TYPE_FLAT,
        });
    }

    let mine_obj = value.get("mine").ok_or_else(|| MineError::CheckpointParseFailure {
        line,
        message: "missing `mine` section".to_owned(),
    })?;
    let mine = mine_config_from_json(mine_obj, line)?;
    let proc = value.get("proc").cloned().unwrap_or(Value::Null);
    let sim = value.get("sim").cloned().unwrap_or(Value::Null);

    let sh = if type_str == HEADER_TYPE_STAGED {
        let sh_value = value.get("sh").ok_or_else(|| MineError::CheckpointParseFailure {
            line,
            message: "missing `sh` section".to_owned(),
        })?;
        Some(
            serde_json::from_value(sh_value.clone()).map_err(|e| MineError::CheckpointParseFailure {
                line,
                message: format!("invalid `sh` section: {e}"),
            })?,
        )
    } else {
        None
    };

    let version = value.get("version").and_then(Value::as_u64).unwrap_or(1) as u32;

    Ok(CheckpointHeader {
        version,
        mine,
        proc,
        sim,
        sh,
    })
}

/// Loads a checkpoint file. Flat checkpoints populate only stage `0`;
/// staged checkpoints populate one entry per stage seen in the file.
///
/// # Errors
/// Returns an error when the first non-empty line is not a valid header, a
/// record line fails to parse, or a record references a negative
/// stage/index.
pub fn load_checkpoint<R: BufRead>(reader: R) -> Result<LoadedCheckpoint> {
    let mut header: Option<CheckpointHeader> = None;
    let mut entries: Vec<(usize, usize, MineRecord)> = Vec::new();

    for (zero_based, line_result) in reader.lines().enumerate() {
        let line_no = zero_based + 1;
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(&line).map_err(|e| MineError::CheckpointParseFailure {
            line: line_no,
            message: e.to_string(),
        })?;

        if header.is_none() {
            header = Some(parse_header_line(&value, line_no)?);
            continue;
        }

        if value.get("type").and_then(Value::as_str) != Some("record") {
            continue;
        }

        let index = value.get("index").and_then(Value::as_i64).ok_or_else(|| MineError::CheckpointParseFailure {
            line: line_no,
            message: "missing `index`".to_owned(),
        })?;
        if index < 0 {
            return Err(MineError::CheckpointOutOfRange {
                line: line_no,
                field: "index",
                value: index,
            });
        }

        let stage = value.get("stage").and_then(Value::as_i64).unwrap_or(0);
        if stage < 0 {
            return Err(MineError::CheckpointOutOfRange {
                line: line_no,
                field: "stage",
                value: stage,
            });
        }

        let record_value = value.get("record").ok_or_else(|| MineError::CheckpointParseFailure {
            line: line_no,
            message: "missing `record`".to_owned(),
        })?;
        let record = record_from_json(record_value, line_no)?;
        entries.push((stage as usize, index as usize, record));
    }

    let header = header.ok_or(MineError::CheckpointParseFailure {
        line: 0,
        message: "checkpoint file has no header".to_owned(),
    })?;

    let max_stage = entries.iter().map(|&(s, _, _)| s).max();
    let mut stages: Vec<StageRecords> = Vec::new();
    if let Some(max_stage) = max_stage {
        stages.resize(max_stage + 1, StageRecords::default());
        for stage in &mut stages {
            *stage = StageRecords::default();
        }
        let mut max_index = vec![0usize; max_stage + 1];
        let mut has_any = vec![false; max_stage + 1];
        for &(stage, index, _) in &entries {
            has_any[stage] = true;
            max_index[stage] = max_index[stage].max(index);
        }
        for (stage, stage_records) in stages.iter_mut().enumerate() {
            if has_any[stage] {
                let len = max_index[stage] + 1;
                stage_records.records = vec![MineRecord::default(); len];
                stage_records.have_index = vec![false; len];
            }
        }
        for (stage, index, record) in entries {
            stages[stage].records[index] = record;
            stages[stage].have_index[index] = true;
        }
    }

    Ok(LoadedCheckpoint { header, stages })
}

fn f32_matches(a: f32, b: f32) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

/// Compares `loaded` against `current`, ignoring `threads`, `proc`/`sim`
/// differences that don't affect canonical JSON, and treating `NaN`
/// `sea_level_override` as matching `NaN`.
///
/// Returns `Ok(())` on a match, or `Err(reason)` describing the first
/// mismatch found.
pub fn configs_match(loaded: &CheckpointHeader, current: &CheckpointHeader) -> std::result::Result<(), String> {
    let a = &loaded.mine;
    let b = &current.mine;

    if a.seed_start != b.seed_start {
        return Err("seedStart differs".to_owned());
    }
    if a.seed_step != b.seed_step {
        return Err("seedStep differs".to_owned());
    }
    if a.seed_xor != b.seed_xor {
        return Err("seedXor differs".to_owned());
    }
    if a.seed_sampler != b.seed_sampler {
        return Err("seedSampler differs".to_owned());
    }
    if a.samples != b.samples {
        return Err("samples differs".to_owned());
    }
    if a.w != b.w || a.h != b.h {
        return Err("world size differs".to_owned());
    }
    if a.days != b.days {
        return Err("days differs".to_owned());
    }
    if a.objective != b.objective {
        return Err("objective differs".to_owned());
    }
    if a.score_expr != b.score_expr {
        return Err("scoreExpr differs".to_owned());
    }
    if a.hydrology_enabled != b.hydrology_enabled {
        return Err("hydrologyEnabled differs".to_owned());
    }
    if !f32_matches(a.sea_level_override, b.sea_level_override) {
        return Err("seaLevelOverride differs".to_owned());
    }
    if a.sea_require_edge_connection != b.sea_require_edge_connection {
        return Err("seaRequireEdgeConnection differs".to_owned());
    }
    if a.sea_eight_connected != b.sea_eight_connected {
        return Err("seaEightConnected differs".to_owned());
    }
    if a.depression_epsilon != b.depression_epsilon {
        return Err("depressionEpsilon differs".to_owned());
    }

    if canonicalize(&loaded.proc) != canonicalize(&current.proc) {
        return Err("proc config differs".to_owned());
    }
    if canonicalize(&loaded.sim) != canonicalize(&current.sim) {
        return Err("sim config differs".to_owned());
    }

    match (&loaded.sh, &current.sh) {
        (None, None) => {}
        (Some(_), None) | (None, Some(_)) => {
            return Err("staged/flat checkpoint type differs".to_owned());
        }
        (Some(a_sh), Some(b_sh)) if a_sh != b_sh => {
            return Err("successive-halving schedule differs".to_owned());
        }
        _ => {}
    }

    Ok(())
}

fn canonicalize(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_record(seed: u64) -> MineRecord {
        let mut r = MineRecord::default();
        r.seed = seed;
        r.w = 16;
        r.h = 16;
        r.score = 42.0;
        r.objective_score = 42.0;
        r
    }

    #[test]
    fn header_then_sparse_records_round_trip() {
        let mut buf = Vec::new();
        {
            let mut writer = CheckpointWriter::new(&mut buf);
            writer.write_header(&MineConfig::default(), &json!({}), &json!({})).unwrap();
            writer.write_record(0, &sample_record(1)).unwrap();
            writer.write_record(2, &sample_record(3)).unwrap();
            writer.write_record(3, &sample_record(4)).unwrap();
        }

        let loaded = load_checkpoint(Cursor::new(buf)).unwrap();
        assert_eq!(loaded.stages.len(), 1);
        let stage = &loaded.stages[0];
        assert_eq!(stage.records.len(), 4);
        assert_eq!(stage.have_index, vec![true, false, true, true]);
        assert_eq!(stage.records[1], MineRecord::default());
        assert_eq!(stage.records[0].seed, 1);
    }

    #[test]
    fn self_configs_always_match() {
        let header = CheckpointHeader {
            version: 1,
            mine: MineConfig::default(),
            proc: json!({"a": 1}),
            sim: json!({"b": 2}),
            sh: None,
        };
        assert_eq!(configs_match(&header, &header.clone()), Ok(()));
    }

    #[test]
    fn mismatched_days_is_reported() {
        let mut other = MineConfig::default();
        other.days = other.days + 1;
        let loaded = CheckpointHeader {
            version: 1,
            mine: MineConfig::default(),
            proc: Value::Null,
            sim: Value::Null,
            sh: None,
        };
        let current = CheckpointHeader {
            version: 1,
            mine: other,
            proc: Value::Null,
            sim: Value::Null,
            sh: None,
        };
        assert_eq!(configs_match(&loaded, &current), Err("days differs".to_owned()));
    }

    #[test]
    fn nan_sea_level_override_matches_nan() {
        let mut mine = MineConfig::default();
        mine.sea_level_override = f32::NAN;
        let header = CheckpointHeader {
            version: 1,
            mine,
            proc: Value::Null,
            sim: Value::Null,
            sh: None,
        };
        assert_eq!(configs_match(&header, &header.clone()), Ok(()));
    }

    #[test]
    fn missing_header_is_rejected() {
        let buf = b"{\"type\":\"record\",\"index\":0,\"record\":{}}\n".to_vec();
        let err = load_checkpoint(Cursor::new(buf)).unwrap_err();
        assert_eq!(err.code(), crate::error::MineErrorCode::CheckpointParseFailure);
    }
}
