//! Command-line interface orchestration for the seed-mining analysis tools.
//!
//! The core (`mine-core`) is host-agnostic: it has no notion of how a
//! checkpoint's worlds were generated or simulated, so this CLI operates on
//! checkpoints already produced by a host application. It offers one
//! subcommand per analysis (`pareto`, `mmr`, `map-elites`, `outliers`,
//! `cluster`, `embed`, `neighbors`) plus a `csv` export command.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use mine_core::{
    ClusteringConfig, DistanceSpaceConfig, MapElitesAxis, MapElitesConfig,
    MineDiversityMode, MineError, MineMetric, MineRecord, MmrConfig, OutlierConfig,
    ParetoObjective, compute_clustering, compute_embedding, compute_map_elites,
    compute_neighbor_graph, compute_outliers, compute_pareto, load_checkpoint,
    select_diverse_top_k, select_top_map_elites_indices, select_top_outlier_indices,
    select_top_pareto_indices, write_records_csv,
};
use thiserror::Error;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(name = "procisocity-mine", about = "Analyze ProcIsoCity seed-mining checkpoints.")]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Rank and annotate checkpoint records with a Pareto front (NSGA-II).
    Pareto(ParetoArgs),
    /// Select a diverse top-K subset via Maximal Marginal Relevance.
    Mmr(MmrArgs),
    /// Bin checkpoint records into a MAP-Elites quality-diversity grid.
    MapElites(MapElitesArgs),
    /// Annotate checkpoint records with LOF outlier/novelty scores.
    Outliers(OutlierArgs),
    /// Partition checkpoint records with k-medoids clustering.
    Cluster(ClusterArgs),
    /// Compute a 2-D classical-MDS embedding of checkpoint records.
    Embed(EmbedArgs),
    /// Build a kNN graph over checkpoint records.
    Neighbors(NeighborArgs),
    /// Export checkpoint records to the fixed CSV schema.
    Csv(CsvArgs),
}

/// Arguments shared by every analysis subcommand.
#[derive(Debug, Args, Clone)]
pub struct CheckpointInput {
    /// Path to a JSON-Lines checkpoint file.
    pub checkpoint: PathBuf,

    /// Stage to read records from (staged checkpoints only).
    #[arg(long, default_value_t = 0)]
    pub stage: usize,
}

/// One `metric:max` or `metric:min` Pareto objective specification.
#[derive(Debug, Clone)]
pub struct ObjectiveSpec {
    /// Metric read from each record.
    pub metric: MineMetric,
    /// Whether larger is preferred.
    pub maximize: bool,
}

fn parse_objective_spec(raw: &str) -> Result<ObjectiveSpec, String> {
    let (name, direction) = raw.split_once(':').ok_or_else(|| {
        format!("objective `{raw}` must be `metric:max` or `metric:min`")
    })?;
    let metric = MineMetric::parse(name).map_err(|e| e.to_string())?;
    let maximize = match direction {
        "max" => true,
        "min" => false,
        other => return Err(format!("unknown objective direction `{other}` (expected `max` or `min`)")),
    };
    Ok(ObjectiveSpec { metric, maximize })
}

/// Arguments for the `pareto` subcommand.
#[derive(Debug, Args, Clone)]
pub struct ParetoArgs {
    #[command(flatten)]
    pub input: CheckpointInput,

    /// One or more `metric:max`/`metric:min` objectives.
    #[arg(long = "objective", value_parser = parse_objective_spec, required = true)]
    pub objectives: Vec<ObjectiveSpec>,

    /// Number of records to report, walking fronts in order.
    #[arg(long, default_value_t = 10)]
    pub top_k: usize,

    /// Sort within a front by crowding distance descending.
    #[arg(long, default_value_t = true)]
    pub use_crowding: bool,
}

/// A distance-mode argument shared by several subcommands.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DistanceModeArg {
    /// Standardized-metric Euclidean distance.
    Scalar,
    /// Perceptual-hash Hamming distance.
    Layout,
    /// A weighted blend of scalar and layout distance.
    Hybrid,
}

impl From<DistanceModeArg> for MineDiversityMode {
    fn from(value: DistanceModeArg) -> Self {
        match value {
            DistanceModeArg::Scalar => Self::Scalar,
            DistanceModeArg::Layout => Self::Layout,
            DistanceModeArg::Hybrid => Self::Hybrid,
        }
    }
}

/// Arguments for the `mmr` subcommand.
#[derive(Debug, Args, Clone)]
pub struct MmrArgs {
    #[command(flatten)]
    pub input: CheckpointInput,

    /// Number of records to return.
    #[arg(long, default_value_t = 10)]
    pub top_k: usize,

    /// Candidate pool size before diversification (`0` auto-sizes).
    #[arg(long, default_value_t = 0)]
    pub candidate_pool: usize,

    /// Relevance/diversity balance in `[0, 1]`.
    #[arg(long, default_value_t = 0.5)]
    pub score_weight: f64,

    /// Distance space to diversify within.
    #[arg(long, value_enum, default_value_t = DistanceModeArg::Scalar)]
    pub mode: DistanceModeArg,

    /// Hybrid blend weight, clamped to `[0, 1]`.
    #[arg(long, default_value_t = 0.5)]
    pub layout_weight: f64,
}

/// Arguments for a single MAP-Elites axis.
#[derive(Debug, Args, Clone)]
pub struct MapElitesAxisArgs {
    /// Metric binned along this axis.
    #[arg(long)]
    pub metric: String,
    /// Number of bins.
    #[arg(long, default_value_t = 10)]
    pub bins: usize,
    /// Lower bound (ignored if `--auto-range` is set).
    #[arg(long, default_value_t = 0.0)]
    pub min: f64,
    /// Upper bound (ignored if `--auto-range` is set).
    #[arg(long, default_value_t = 1.0)]
    pub max: f64,
    /// Infer `[min, max]` from the records instead of using the given bounds.
    #[arg(long, default_value_t = false)]
    pub auto_range: bool,
}

/// Arguments for the `map-elites` subcommand.
#[derive(Debug, Args, Clone)]
pub struct MapElitesArgs {
    #[command(flatten)]
    pub input: CheckpointInput,

    /// Horizontal axis.
    #[command(flatten)]
    pub x: MapElitesAxisArgs,

    /// Metric binned along the vertical axis.
    #[arg(long = "y-metric")]
    pub y_metric: String,
    /// Number of bins along the vertical axis.
    #[arg(long = "y-bins", default_value_t = 10)]
    pub y_bins: usize,
    /// Lower bound of the vertical axis (ignored if `--y-auto-range` is set).
    #[arg(long = "y-min", default_value_t = 0.0)]
    pub y_min: f64,
    /// Upper bound of the vertical axis (ignored if `--y-auto-range` is set).
    #[arg(long = "y-max", default_value_t = 1.0)]
    pub y_max: f64,
    /// Infer the vertical axis range from the records instead of using the given bounds.
    #[arg(long = "y-auto-range", default_value_t = false)]
    pub y_auto_range: bool,

    /// Metric used to rank candidates within a cell.
    #[arg(long, default_value = "score")]
    pub quality_metric: String,
    /// Whether larger quality wins.
    #[arg(long, default_value_t = true)]
    pub quality_maximize: bool,
    /// Clamp out-of-range values into the nearest bin instead of dropping them.
    #[arg(long, default_value_t = true)]
    pub clamp_to_bounds: bool,
    /// Number of elites to report.
    #[arg(long, default_value_t = 10)]
    pub top_k: usize,
}

/// Arguments for the `outliers` subcommand.
#[derive(Debug, Args, Clone)]
pub struct OutlierArgs {
    #[command(flatten)]
    pub input: CheckpointInput,

    /// Neighbourhood size.
    #[arg(long, default_value_t = 10)]
    pub k: usize,

    /// Number of outliers to report.
    #[arg(long, default_value_t = 10)]
    pub top_k: usize,
}

/// Arguments for the `cluster` subcommand.
#[derive(Debug, Args, Clone)]
pub struct ClusterArgs {
    #[command(flatten)]
    pub input: CheckpointInput,

    /// Requested cluster count.
    #[arg(long, default_value_t = 4)]
    pub k: usize,

    /// Maximum refinement iterations.
    #[arg(long, default_value_t = 30)]
    pub max_iters: usize,
}

/// Arguments for the `embed` subcommand.
#[derive(Debug, Args, Clone)]
pub struct EmbedArgs {
    #[command(flatten)]
    pub input: CheckpointInput,

    /// Power-iteration steps.
    #[arg(long, default_value_t = 50)]
    pub power_iters: usize,
}

/// Arguments for the `neighbors` subcommand.
#[derive(Debug, Args, Clone)]
pub struct NeighborArgs {
    #[command(flatten)]
    pub input: CheckpointInput,

    /// Neighbourhood size.
    #[arg(long, default_value_t = 5)]
    pub k: usize,
}

/// Arguments for the `csv` export subcommand.
#[derive(Debug, Args, Clone)]
pub struct CsvArgs {
    #[command(flatten)]
    pub input: CheckpointInput,

    /// Destination CSV path.
    pub output: PathBuf,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O failed while loading or writing a file.
    #[error("failed to access `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The requested checkpoint stage has no records.
    #[error("checkpoint `{path}` has no records for stage {stage}")]
    EmptyStage {
        /// Checkpoint path.
        path: PathBuf,
        /// Requested stage.
        stage: usize,
    },
    /// Core mining-analysis orchestration failed.
    #[error(transparent)]
    Core(#[from] MineError),
}

/// Output of a single analysis command: a human-readable summary plus the
/// records it ran over, for callers that want to inspect the full set.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Lines to print, one per row of the rendered report.
    pub lines: Vec<String>,
}

fn load_records(input: &CheckpointInput) -> Result<Vec<MineRecord>, CliError> {
    let file = File::open(&input.checkpoint).map_err(|source| CliError::Io {
        path: input.checkpoint.clone(),
        source,
    })?;
    let loaded = load_checkpoint(BufReader::new(file))?;
    let stage = loaded.stages.get(input.stage).cloned().unwrap_or_default();
    if stage.records.is_empty() {
        return Err(CliError::EmptyStage {
            path: input.checkpoint.clone(),
            stage: input.stage,
        });
    }
    Ok(stage.records)
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when the checkpoint cannot be read or an analysis
/// fails.
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Pareto(args) => run_pareto(args),
        Command::Mmr(args) => run_mmr(args),
        Command::MapElites(args) => run_map_elites(args),
        Command::Outliers(args) => run_outliers(args),
        Command::Cluster(args) => run_cluster(args),
        Command::Embed(args) => run_embed(args),
        Command::Neighbors(args) => run_neighbors(args),
        Command::Csv(args) => run_csv(args),
    }
}

fn default_selection(n: usize) -> Vec<usize> {
    (0..n).collect()
}

fn run_pareto(args: ParetoArgs) -> Result<ExecutionSummary, CliError> {
    let records = load_records(&args.input)?;
    let selection = default_selection(records.len());
    let objectives: Vec<ParetoObjective> = args
        .objectives
        .iter()
        .map(|spec| ParetoObjective { metric: spec.metric, maximize: spec.maximize })
        .collect();
    let result = compute_pareto(&records, &selection, &objectives);
    let top = select_top_pareto_indices(&result, args.top_k, args.use_crowding);

    let mut lines = vec![format!("fronts: {}", result.fronts.len())];
    for i in top {
        let record = &records[selection[i]];
        lines.push(format!(
            "seed=0x{:016x} rank={} crowding={:.6} score={:.6}",
            record.seed, result.rank[i], result.crowding[i], record.score
        ));
    }
    Ok(ExecutionSummary { lines })
}

fn run_mmr(args: MmrArgs) -> Result<ExecutionSummary, CliError> {
    let records = load_records(&args.input)?;
    let selection = default_selection(records.len());
    let cfg = MmrConfig {
        diverse: true,
        top_k: args.top_k,
        candidate_pool: args.candidate_pool,
        score_weight: args.score_weight,
        mode: args.mode.into(),
        layout_weight: args.layout_weight,
    };
    let picked = select_diverse_top_k(&records, &selection, &cfg);

    let mut lines = vec![format!("selected: {}", picked.len())];
    for i in picked {
        let record = &records[selection[i]];
        lines.push(format!("seed=0x{:016x} score={:.6}", record.seed, record.score));
    }
    Ok(ExecutionSummary { lines })
}

fn axis_from_args(metric: &str, bins: usize, min: f64, max: f64, auto: bool) -> Result<MapElitesAxis, CliError> {
    let metric = MineMetric::parse(metric).map_err(CliError::Core)?;
    Ok(MapElitesAxis { metric, bins, min, max, auto_range: auto })
}

fn run_map_elites(args: MapElitesArgs) -> Result<ExecutionSummary, CliError> {
    let records = load_records(&args.input)?;
    let selection = default_selection(records.len());
    let x_axis = axis_from_args(&args.x.metric, args.x.bins, args.x.min, args.x.max, args.x.auto_range)?;
    let y_axis = axis_from_args(&args.y_metric, args.y_bins, args.y_min, args.y_max, args.y_auto_range)?;
    let quality_metric = MineMetric::parse(&args.quality_metric).map_err(CliError::Core)?;
    let cfg = MapElitesConfig {
        x_axis,
        y_axis,
        quality_metric,
        quality_maximize: args.quality_maximize,
        clamp_to_bounds: args.clamp_to_bounds,
    };
    let result = compute_map_elites(&records, &selection, &cfg);
    let top = select_top_map_elites_indices(
        &result,
        &records,
        &selection,
        quality_metric,
        args.quality_maximize,
        args.top_k,
    );

    let mut lines = vec![format!(
        "filled: {}/{} coverage={:.4} qd_score={:.6}",
        result.filled_cells,
        result.x_bins * result.y_bins,
        result.coverage,
        result.qd_score
    )];
    for i in top {
        let record = &records[selection[i]];
        lines.push(format!("seed=0x{:016x} score={:.6}", record.seed, record.score));
    }
    Ok(ExecutionSummary { lines })
}

fn run_outliers(args: OutlierArgs) -> Result<ExecutionSummary, CliError> {
    let records = load_records(&args.input)?;
    let selection = default_selection(records.len());
    let cfg = OutlierConfig { k: args.k, space: DistanceSpaceConfig::default() };
    let result = compute_outliers(&records, &selection, &cfg);
    let top = select_top_outlier_indices(&result, &records, &selection, args.top_k);

    let mut lines = vec![format!("entries: {}", result.lof.len())];
    for i in top {
        let record = &records[selection[i]];
        lines.push(format!(
            "seed=0x{:016x} lof={:.6} novelty={:.6}",
            record.seed, result.lof[i], result.novelty[i]
        ));
    }
    Ok(ExecutionSummary { lines })
}

fn run_cluster(args: ClusterArgs) -> Result<ExecutionSummary, CliError> {
    let records = load_records(&args.input)?;
    let selection = default_selection(records.len());
    let cfg = ClusteringConfig { k: args.k, max_iters: args.max_iters, space: DistanceSpaceConfig::default() };
    let result = compute_clustering(&records, &selection, &cfg);

    let mut lines = vec![format!(
        "k={} total_cost={:.6} avg_silhouette={:.6}",
        result.k, result.total_cost, result.avg_silhouette
    )];
    for (cluster, &size) in result.cluster_sizes.iter().enumerate() {
        let medoid = records[result.medoid_rec_index[cluster]].seed;
        lines.push(format!("cluster {cluster}: size={size} medoid=0x{medoid:016x}"));
    }
    Ok(ExecutionSummary { lines })
}

fn run_embed(args: EmbedArgs) -> Result<ExecutionSummary, CliError> {
    let records = load_records(&args.input)?;
    let selection = default_selection(records.len());
    let result = compute_embedding(&records, &selection, &DistanceSpaceConfig::default(), args.power_iters);

    let mut lines = vec![format!(
        "eigenvalue1={:.6} eigenvalue2={:.6} ok={} warning={}",
        result.eigenvalue1,
        result.eigenvalue2,
        result.ok,
        result.warning.as_deref().unwrap_or("none")
    )];
    for (i, &idx) in selection.iter().enumerate() {
        lines.push(format!("seed=0x{:016x} x={:.6} y={:.6}", records[idx].seed, result.x[i], result.y[i]));
    }
    Ok(ExecutionSummary { lines })
}

fn run_neighbors(args: NeighborArgs) -> Result<ExecutionSummary, CliError> {
    let records = load_records(&args.input)?;
    let selection = default_selection(records.len());
    let graph = compute_neighbor_graph(&records, &selection, &DistanceSpaceConfig::default(), args.k);

    let mut lines = vec![format!("entries: {}", graph.neighbors.len())];
    for (i, hits) in graph.neighbors.iter().enumerate() {
        let seed = records[selection[i]].seed;
        let neighbor_seeds: Vec<String> = hits
            .iter()
            .map(|n| format!("0x{:016x}", records[selection[n.id as usize]].seed))
            .collect();
        lines.push(format!("seed=0x{:016x} neighbors=[{}]", seed, neighbor_seeds.join(", ")));
    }
    Ok(ExecutionSummary { lines })
}

fn run_csv(args: CsvArgs) -> Result<ExecutionSummary, CliError> {
    let records = load_records(&args.input)?;
    let file = File::create(&args.output).map_err(|source| CliError::Io {
        path: args.output.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    write_records_csv(&mut writer, &records)?;
    writer.flush().map_err(|source| CliError::Io { path: args.output.clone(), source })?;
    Ok(ExecutionSummary { lines: vec![format!("wrote {} records to {}", records.len(), args.output.display())] })
}

/// Renders `summary` to `writer`, one line per entry.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    for line in &summary.lines {
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mine_core::{CheckpointWriter, MineConfig};
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn record_with(seed: u64) -> MineRecord {
        MineRecord {
            seed,
            w: 16,
            h: 16,
            score: seed as f64,
            stats: mine_core::Stats {
                population: 100 + seed as i32 * 10,
                ..mine_core::Stats::default()
            },
            ..MineRecord::default()
        }
    }

    fn write_sample_checkpoint(path: &Path) {
        let mut file = File::create(path).unwrap();
        let mut writer = CheckpointWriter::new(&mut file);
        writer.write_header(&MineConfig::default(), &json!({}), &json!({})).unwrap();
        for seed in 0..6u64 {
            writer.write_record(seed as usize, &record_with(seed)).unwrap();
        }
    }

    #[test]
    fn pareto_command_reports_fronts() {
        let file = NamedTempFile::new().unwrap();
        write_sample_checkpoint(file.path());
        let args = ParetoArgs {
            input: CheckpointInput { checkpoint: file.path().to_path_buf(), stage: 0 },
            objectives: vec![ObjectiveSpec { metric: MineMetric::Score, maximize: true }],
            top_k: 3,
            use_crowding: true,
        };
        let summary = run_pareto(args).unwrap();
        assert!(summary.lines[0].starts_with("fronts:"));
        assert_eq!(summary.lines.len(), 4);
    }

    #[test]
    fn csv_command_writes_header_and_rows() {
        let checkpoint = NamedTempFile::new().unwrap();
        write_sample_checkpoint(checkpoint.path());
        let output = NamedTempFile::new().unwrap();
        let args = CsvArgs {
            input: CheckpointInput { checkpoint: checkpoint.path().to_path_buf(), stage: 0 },
            output: output.path().to_path_buf(),
        };
        run_csv(args).unwrap();
        let text = std::fs::read_to_string(output.path()).unwrap();
        assert!(text.starts_with("seed,seed_hex,"));
        assert_eq!(text.lines().count(), 7);
    }

    #[test]
    fn missing_checkpoint_reports_io_error() {
        let args = CheckpointInput { checkpoint: PathBuf::from("/nonexistent/path.jsonl"), stage: 0 };
        let err = load_records(&args).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[test]
    fn parse_objective_spec_rejects_missing_direction() {
        assert!(parse_objective_spec("score").is_err());
    }

    #[test]
    fn parse_objective_spec_accepts_max_and_min() {
        let max = parse_objective_spec("score:max").unwrap();
        assert!(max.maximize);
        let min = parse_objective_spec("traffic_congestion:min").unwrap();
        assert!(!min.maximize);
    }

    #[test]
    fn clap_rejects_unknown_distance_mode() {
        let args = ["procisocity-mine", "mmr", "checkpoint.jsonl", "--mode", "bogus"];
        let result = Cli::try_parse_from(args);
        assert!(result.is_err());
    }
}
