//! MAP-Elites quality-diversity grid over two behavior-descriptor axes.

use crate::record::{MineMetric, MineRecord};

/// One behavior-descriptor axis of the grid.
#[derive(Clone, Copy, Debug)]
pub struct MapElitesAxis {
    /// Metric binned along this axis.
    pub metric: MineMetric,
    /// Number of bins, must be positive.
    pub bins: usize,
    /// Lower bound; ignored when `auto_range` is set.
    pub min: f64,
    /// Upper bound; ignored when `auto_range` is set.
    pub max: f64,
    /// When set, `[min, max]` is inferred from the records instead of used directly.
    pub auto_range: bool,
}

/// Configuration for [`compute_map_elites`].
#[derive(Clone, Copy, Debug)]
pub struct MapElitesConfig {
    /// Horizontal axis.
    pub x_axis: MapElitesAxis,
    /// Vertical axis.
    pub y_axis: MapElitesAxis,
    /// Metric used to rank candidates within a cell.
    pub quality_metric: MineMetric,
    /// Whether larger quality wins (otherwise smaller wins).
    pub quality_maximize: bool,
    /// When `true`, out-of-range values are clamped into the nearest bin
    /// instead of rejecting the record.
    pub clamp_to_bounds: bool,
}

/// Resolved grid: per-cell winners plus summary statistics.
#[derive(Clone, Debug, Default)]
pub struct MapElitesResult {
    /// `cells[y * x_bins + x]` is `Some(selection index)` of the cell's
    /// winner, or `None` if the cell is empty.
    pub cells: Vec<Option<usize>>,
    /// Horizontal bin count.
    pub x_bins: usize,
    /// Vertical bin count.
    pub y_bins: usize,
    /// Number of non-empty cells.
    pub filled_cells: usize,
    /// `filled_cells / (x_bins * y_bins)`.
    pub coverage: f64,
    /// Sum of quality across filled cells.
    pub qd_score: f64,
}

fn resolve_range(axis: &MapElitesAxis, records: &[MineRecord], selection: &[usize]) -> (f64, f64) {
    if !axis.auto_range {
        return (axis.min, axis.max);
    }
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &idx in selection {
        let v = axis.metric.value(&records[idx]);
        if v.is_finite() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    if !(hi > lo) {
        hi = lo + 1e-9;
    }
    (lo, hi)
}

fn bin_of(v: f64, lo: f64, hi: f64, bins: usize, clamp: bool) -> Option<usize> {
    let span = if hi > lo { hi - lo } else { 1.0 };
    let raw = ((v - lo) / span * bins as f64).floor();
    if raw < 0.0 || raw >= bins as f64 {
        if clamp {
            Some(raw.clamp(0.0, (bins - 1) as f64) as usize)
        } else {
            None
        }
    } else {
        Some(raw as usize)
    }
}

fn better(
    cfg: &MapElitesConfig,
    records: &[MineRecord],
    selection: &[usize],
    candidate: usize,
    incumbent: usize,
) -> bool {
    let cand = &records[selection[candidate]];
    let inc = &records[selection[incumbent]];
    let cq = cfg.quality_metric.value(cand);
    let iq = cfg.quality_metric.value(inc);
    let (cq, iq) = if cfg.quality_maximize { (cq, iq) } else { (-cq, -iq) };
    if cq != iq {
        return cq > iq;
    }
    if cand.seed != inc.seed {
        return cand.seed < inc.seed;
    }
    selection[candidate] < selection[incumbent]
}

/// Computes the MAP-Elites grid over `records[selection[*]]`.
#[must_use]
pub fn compute_map_elites(
    records: &[MineRecord],
    selection: &[usize],
    cfg: &MapElitesConfig,
) -> MapElitesResult {
    let (x_lo, x_hi) = resolve_range(&cfg.x_axis, records, selection);
    let (y_lo, y_hi) = resolve_range(&cfg.y_axis, records, selection);
    let x_bins = cfg.x_axis.bins.max(1);
    let y_bins = cfg.y_axis.bins.max(1);

    let mut cells: Vec<Option<usize>> = vec![None; x_bins * y_bins];

    for (i, &idx) in selection.iter().enumerate() {
        let record = &records[idx];
        let vx = cfg.x_axis.metric.value(record);
        let vy = cfg.y_axis.metric.value(record);
        let Some(bx) = bin_of(vx, x_lo, x_hi, x_bins, cfg.clamp_to_bounds) else {
            continue;
        };
        let Some(by) = bin_of(vy, y_lo, y_hi, y_bins, cfg.clamp_to_bounds) else {
            continue;
        };
        let cell = by * x_bins + bx;
        match cells[cell] {
            None => cells[cell] = Some(i),
            Some(incumbent) if better(cfg, records, selection, i, incumbent) => {
                cells[cell] = Some(i);
            }
            Some(_) => {}
        }
    }

    let filled_cells = cells.iter().filter(|c| c.is_some()).count();
    let coverage = filled_cells as f64 / (x_bins * y_bins) as f64;
    let qd_score = cells
        .iter()
        .filter_map(|c| c.map(|i| cfg.quality_metric.value(&records[selection[i]])))
        .sum();

    MapElitesResult {
        cells,
        x_bins,
        y_bins,
        filled_cells,
        coverage,
        qd_score,
    }
}

/// Returns up to `top_k` selection indices of filled elites, sorted by
/// quality descending with the same tie-break as cell selection.
#[must_use]
pub fn select_top_map_elites_indices(
    result: &MapElitesResult,
    records: &[MineRecord],
    selection: &[usize],
    quality_metric: MineMetric,
    quality_maximize: bool,
    top_k: usize,
) -> Vec<usize> {
    let mut winners: Vec<usize> = result.cells.iter().filter_map(|c| *c).collect();
    winners.sort_by(|&a, &b| {
        let ra = &records[selection[a]];
        let rb = &records[selection[b]];
        let (qa, qb) = if quality_maximize {
            (quality_metric.value(ra), quality_metric.value(rb))
        } else {
            (-quality_metric.value(ra), -quality_metric.value(rb))
        };
        qb.partial_cmp(&qa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ra.seed.cmp(&rb.seed))
            .then_with(|| selection[a].cmp(&selection[b]))
    });
    winners.truncate(top_k);
    winners
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(seed: u64, water_frac: f64, road_frac: f64, score: f64) -> MineRecord {
        let mut r = MineRecord::default();
        r.seed = seed;
        r.w = 16;
        r.h = 16;
        r.water_frac = water_frac;
        r.road_frac = road_frac;
        r.score = score;
        r
    }

    fn scenario_config() -> MapElitesConfig {
        MapElitesConfig {
            x_axis: MapElitesAxis { metric: MineMetric::WaterFrac, bins: 4, min: 0.0, max: 1.0, auto_range: false },
            y_axis: MapElitesAxis { metric: MineMetric::RoadFrac, bins: 4, min: 0.0, max: 1.0, auto_range: false },
            quality_metric: MineMetric::Score,
            quality_maximize: true,
            clamp_to_bounds: true,
        }
    }

    #[test]
    fn filled_cells_never_exceed_grid_size() {
        let records: Vec<MineRecord> = (0..20)
            .map(|i| record_with(i as u64, (i as f64 * 0.05) % 1.0, (i as f64 * 0.07) % 1.0, f64::from(i)))
            .collect();
        let selection: Vec<usize> = (0..20).collect();
        let cfg = scenario_config();
        let result = compute_map_elites(&records, &selection, &cfg);
        assert!(result.filled_cells <= 16);
        assert!((result.coverage - result.filled_cells as f64 / 16.0).abs() < 1e-12);
    }

    #[test]
    fn higher_quality_wins_the_same_cell() {
        let records = vec![
            record_with(1, 0.1, 0.1, 5.0),
            record_with(2, 0.1, 0.1, 9.0),
        ];
        let selection: Vec<usize> = (0..2).collect();
        let cfg = scenario_config();
        let result = compute_map_elites(&records, &selection, &cfg);
        let filled: Vec<_> = result.cells.iter().filter_map(|c| *c).collect();
        assert_eq!(filled, vec![1]);
    }

    #[test]
    fn ties_break_by_lower_seed() {
        let records = vec![
            record_with(5, 0.1, 0.1, 5.0),
            record_with(2, 0.1, 0.1, 5.0),
        ];
        let selection: Vec<usize> = (0..2).collect();
        let cfg = scenario_config();
        let result = compute_map_elites(&records, &selection, &cfg);
        let filled: Vec<_> = result.cells.iter().filter_map(|c| *c).collect();
        assert_eq!(filled, vec![1]);
    }
}
