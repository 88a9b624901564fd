//! Batch and cooperative drivers that run [`crate::mine_one::mine_one`]
//! across many seeds with deterministic, thread-count-independent output.

use crate::config::MineConfig;
use crate::error::{MineError, Result};
use crate::expr::Program;
use crate::mine_one::{mine_one, HydrologySettings};
use crate::record::MineRecord;
use crate::sampler::{seed_for_sample, SeedPlan};
use crate::world::{DepressionFillConfig, Hydrology, SeaFloodConfig, Simulator, WorldGenerator};

/// Receives per-sample progress notifications in strictly increasing `index`
/// order, even when mining runs across multiple threads.
pub trait MineProgress {
    /// Called once per sample, in order, after `records[index]` is final.
    fn on_progress(&mut self, index: usize, total: usize, record: &MineRecord);
}

impl<F: FnMut(usize, usize, &MineRecord)> MineProgress for F {
    fn on_progress(&mut self, index: usize, total: usize, record: &MineRecord) {
        self(index, total, record);
    }
}

fn resolve_thread_count(threads: i32, samples: usize) -> usize {
    if samples == 0 {
        return 1;
    }
    let auto = std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1);
    let wanted = if threads <= 0 { auto } else { threads as usize };
    wanted.clamp(1, samples)
}

fn resolve_hydrology(cfg: &MineConfig, default_sea_level: f32) -> HydrologySettings {
    let sea_level = if cfg.sea_level_override.is_finite() {
        cfg.sea_level_override
    } else {
        default_sea_level
    };
    HydrologySettings {
        enabled: cfg.hydrology_enabled,
        sea_level,
        sea: SeaFloodConfig {
            require_edge_connection: cfg.sea_require_edge_connection,
            eight_connected: cfg.sea_eight_connected,
        },
        depression: DepressionFillConfig {
            include_edges: true,
            epsilon: cfg.depression_epsilon,
        },
    }
}

fn compile_score_expr(cfg: &MineConfig) -> Result<Option<Program>> {
    if cfg.score_expr.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Program::compile(&cfg.score_expr)?))
    }
}

/// Runs `mine_one` for `total` samples, resolving seed `i` via `seed_at`.
///
/// Single-threaded when the `parallel` feature is disabled or `cfg.threads
/// <= 1`; otherwise uses a rayon thread pool sized by `cfg.threads` (`<= 0`
/// means hardware concurrency). `records[i]` always corresponds to sample
/// index `i` regardless of thread count or completion order.
#[allow(clippy::too_many_arguments)]
fn mine_indices<G, S, H, F, SeedAt>(
    cfg: &MineConfig,
    proc_cfg: &G::ProcConfig,
    generator: &G,
    make_simulator: F,
    hydrology: &H,
    default_sea_level: f32,
    total: usize,
    seed_at: SeedAt,
    mut progress: Option<&mut dyn MineProgress>,
) -> Result<Vec<MineRecord>>
where
    G: WorldGenerator + Sync,
    G::ProcConfig: Sync,
    S: Simulator<G::World>,
    F: Fn() -> S + Sync,
    H: Hydrology + Sync,
    SeedAt: Fn(usize) -> u64 + Sync,
{
    cfg.validate()?;
    if total == 0 {
        return Ok(Vec::new());
    }

    let weights = cfg.objective.weights();
    let hydro = resolve_hydrology(cfg, default_sea_level);
    let score_expr = compile_score_expr(cfg)?;

    let mut records = vec![MineRecord::default(); total];

    #[cfg(feature = "parallel")]
    {
        let want_threads = resolve_thread_count(cfg.threads, total);
        if want_threads > 1 {
            run_parallel(
                cfg,
                proc_cfg,
                generator,
                &make_simulator,
                hydrology,
                hydro,
                &weights,
                score_expr.as_ref(),
                &seed_at,
                want_threads,
                &mut records,
            )?;
            if let Some(p) = progress.as_deref_mut() {
                for (i, record) in records.iter().enumerate() {
                    p.on_progress(i, total, record);
                }
            }
            return Ok(records);
        }
    }

    let mut sim = make_simulator();
    for (i, slot) in records.iter_mut().enumerate() {
        let seed = seed_at(i);
        let record = mine_one(
            seed,
            cfg.w,
            cfg.h,
            cfg.days,
            proc_cfg,
            generator,
            &mut sim,
            hydro,
            hydrology,
            &weights,
            score_expr.as_ref(),
        );
        *slot = record;
        if let Some(p) = progress.as_deref_mut() {
            p.on_progress(i, total, slot);
        }
    }

    Ok(records)
}

#[cfg(feature = "parallel")]
#[allow(clippy::too_many_arguments)]
fn run_parallel<G, S, H, F, SeedAt>(
    cfg: &MineConfig,
    proc_cfg: &G::ProcConfig,
    generator: &G,
    make_simulator: &F,
    hydrology: &H,
    hydro: HydrologySettings,
    weights: &crate::config::ScoreWeights,
    score_expr: Option<&Program>,
    seed_at: &SeedAt,
    want_threads: usize,
    records: &mut [MineRecord],
) -> Result<()>
where
    G: WorldGenerator + Sync,
    G::ProcConfig: Sync,
    S: Simulator<G::World>,
    F: Fn() -> S + Sync,
    H: Hydrology + Sync,
    SeedAt: Fn(usize) -> u64 + Sync,
{
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(want_threads)
        .build()
        .map_err(|e| MineError::Io { source: std::io::Error::other(e) })?;

    pool.install(|| {
        records.par_iter_mut().enumerate().for_each_init(make_simulator, |sim, (i, slot)| {
            let seed = seed_at(i);
            *slot = mine_one(
                seed,
                cfg.w,
                cfg.h,
                cfg.days,
                proc_cfg,
                generator,
                sim,
                hydro,
                hydrology,
                weights,
                score_expr,
            );
        });
    });

    Ok(())
}

/// Mines `cfg.samples` seeds enumerated via [`seed_for_sample`].
///
/// # Errors
/// Returns an error if `cfg` fails validation or `cfg.score_expr` fails to
/// compile.
#[allow(clippy::too_many_arguments)]
pub fn mine_seeds<G, S, H, F>(
    cfg: &MineConfig,
    proc_cfg: &G::ProcConfig,
    generator: &G,
    make_simulator: F,
    hydrology: &H,
    default_sea_level: f32,
    progress: Option<&mut dyn MineProgress>,
) -> Result<Vec<MineRecord>>
where
    G: WorldGenerator + Sync,
    G::ProcConfig: Sync,
    S: Simulator<G::World>,
    F: Fn() -> S + Sync,
    H: Hydrology + Sync,
{
    let total = cfg.samples.max(0) as usize;
    let plan = SeedPlan {
        seed_start: cfg.seed_start,
        seed_step: cfg.seed_step,
        seed_xor: cfg.seed_xor,
        sampler: cfg.seed_sampler,
    };
    mine_indices(
        cfg,
        proc_cfg,
        generator,
        make_simulator,
        hydrology,
        default_sea_level,
        total,
        move |i| seed_for_sample(plan, i as u64),
        progress,
    )
}

/// Mines the explicit `seeds` list instead of an enumerated sample range.
///
/// # Errors
/// Returns an error if `cfg` fails validation or `cfg.score_expr` fails to
/// compile.
#[allow(clippy::too_many_arguments)]
pub fn mine_seeds_explicit<G, S, H, F>(
    cfg: &MineConfig,
    proc_cfg: &G::ProcConfig,
    generator: &G,
    make_simulator: F,
    hydrology: &H,
    default_sea_level: f32,
    seeds: &[u64],
    progress: Option<&mut dyn MineProgress>,
) -> Result<Vec<MineRecord>>
where
    G: WorldGenerator + Sync,
    G::ProcConfig: Sync,
    S: Simulator<G::World>,
    F: Fn() -> S + Sync,
    H: Hydrology + Sync,
{
    mine_indices(
        cfg,
        proc_cfg,
        generator,
        make_simulator,
        hydrology,
        default_sea_level,
        seeds.len(),
        move |i| seeds[i],
        progress,
    )
}

/// A cooperative, strictly single-threaded driver for UI integration that
/// spreads mining across many short `step` calls instead of one long run.
pub struct MineSession<G, S, H>
where
    G: WorldGenerator,
    S: Simulator<G::World>,
    H: Hydrology,
{
    cfg: MineConfig,
    proc_cfg: G::ProcConfig,
    generator: G,
    simulator: S,
    hydrology: H,
    hydro: HydrologySettings,
    weights: crate::config::ScoreWeights,
    score_expr: Option<Program>,
    next_index: usize,
    total: usize,
    records: Vec<MineRecord>,
}

impl<G, S, H> MineSession<G, S, H>
where
    G: WorldGenerator,
    S: Simulator<G::World>,
    H: Hydrology,
{
    /// Builds a session ready to mine `cfg.samples` seeds, one `step` call at
    /// a time.
    ///
    /// # Errors
    /// Returns an error if `cfg` fails validation or `cfg.score_expr` fails
    /// to compile.
    pub fn new(
        cfg: MineConfig,
        proc_cfg: G::ProcConfig,
        generator: G,
        simulator: S,
        hydrology: H,
        default_sea_level: f32,
    ) -> Result<Self> {
        cfg.validate()?;
        let score_expr = compile_score_expr(&cfg)?;
        let hydro = resolve_hydrology(&cfg, default_sea_level);
        let weights = cfg.objective.weights();
        let total = cfg.samples.max(0) as usize;
        Ok(Self {
            cfg,
            proc_cfg,
            generator,
            simulator,
            hydrology,
            hydro,
            weights,
            score_expr,
            next_index: 0,
            total,
            records: vec![MineRecord::default(); total],
        })
    }

    /// Processes up to `max_steps` remaining samples, invoking `progress` for
    /// each. Returns `true` once every sample has been mined.
    pub fn step(&mut self, max_steps: usize, mut progress: Option<&mut dyn MineProgress>) -> bool {
        let plan = SeedPlan {
            seed_start: self.cfg.seed_start,
            seed_step: self.cfg.seed_step,
            seed_xor: self.cfg.seed_xor,
            sampler: self.cfg.seed_sampler,
        };

        let mut steps_done = 0;
        while steps_done < max_steps && self.next_index < self.total {
            let i = self.next_index;
            let seed = seed_for_sample(plan, i as u64);
            let record = mine_one(
                seed,
                self.cfg.w,
                self.cfg.h,
                self.cfg.days,
                &self.proc_cfg,
                &self.generator,
                &mut self.simulator,
                self.hydro,
                &self.hydrology,
                &self.weights,
                self.score_expr.as_ref(),
            );
            self.records[i] = record;
            if let Some(p) = progress.as_deref_mut() {
                p.on_progress(i, self.total, &self.records[i]);
            }
            self.next_index += 1;
            steps_done += 1;
        }

        self.next_index >= self.total
    }

    /// Records mined so far; entries past the cursor are default-initialized.
    #[must_use]
    pub fn records(&self) -> &[MineRecord] {
        &self.records
    }

    /// Number of samples already mined.
    #[must_use]
    pub fn progress_index(&self) -> usize {
        self.next_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mine_test_support::doubles::{FakeGenerator, FakeHydrology, FakeSimulator};

    fn default_cfg(samples: i32, threads: i32) -> MineConfig {
        MineConfig {
            seed_start: 1,
            seed_step: 1,
            samples,
            w: 16,
            h: 16,
            days: 0,
            threads,
            ..MineConfig::default()
        }
    }

    #[test]
    fn records_correspond_to_sample_index() {
        let cfg = default_cfg(8, 1);
        let records = mine_seeds(
            &cfg,
            &(),
            &FakeGenerator,
            FakeSimulator::new,
            &FakeHydrology,
            0.3,
            None,
        )
        .expect("mining succeeds");

        assert_eq!(records.len(), 8);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.seed, 1 + i as u64);
            assert_eq!(record.w, 16);
        }
    }

    #[test]
    fn thread_count_does_not_change_results() {
        let single = mine_seeds(
            &default_cfg(8, 1),
            &(),
            &FakeGenerator,
            FakeSimulator::new,
            &FakeHydrology,
            0.3,
            None,
        )
        .unwrap();
        let multi = mine_seeds(
            &default_cfg(8, 4),
            &(),
            &FakeGenerator,
            FakeSimulator::new,
            &FakeHydrology,
            0.3,
            None,
        )
        .unwrap();
        assert_eq!(single, multi);
    }

    #[test]
    fn progress_is_invoked_in_increasing_order() {
        let cfg = default_cfg(8, 4);
        let mut seen = Vec::new();
        {
            let mut cb = |index: usize, _total: usize, _record: &MineRecord| {
                seen.push(index);
            };
            mine_seeds(&cfg, &(), &FakeGenerator, FakeSimulator::new, &FakeHydrology, 0.3, Some(&mut cb))
                .unwrap();
        }
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn invalid_config_is_rejected_before_mining() {
        let cfg = default_cfg(-1, 1);
        let err = mine_seeds(&cfg, &(), &FakeGenerator, FakeSimulator::new, &FakeHydrology, 0.3, None)
            .unwrap_err();
        assert_eq!(err.code(), crate::error::MineErrorCode::InvalidSampleCount);
    }

    #[test]
    fn session_step_reproduces_batch_results() {
        let cfg = default_cfg(5, 1);
        let batch = mine_seeds(&cfg, &(), &FakeGenerator, FakeSimulator::new, &FakeHydrology, 0.3, None)
            .unwrap();

        let mut session = MineSession::new(cfg, (), FakeGenerator, FakeSimulator::new(), FakeHydrology, 0.3)
            .unwrap();
        assert!(!session.step(2, None));
        assert!(session.step(10, None));
        assert_eq!(session.records(), batch.as_slice());
    }
}
