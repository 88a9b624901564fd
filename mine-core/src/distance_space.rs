//! Shared feature standardization and distance functions used by the
//! outlier, clustering, embedding, and neighbor-graph analyses.
//!
//! All four analyses standardize the same way (§4.9's preparation recipe)
//! and then measure distance in one of three spaces: a purely numeric
//! **Scalar** space, a purely perceptual **Layout** space built from the
//! overlay pHash, or a **Hybrid** blend of the two.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MineError;
use crate::phash::hamming_distance_64;
use crate::record::{MineMetric, MineRecord};
use crate::sampler::normalize_key;

/// Selects which distance function a multi-record analysis measures with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum MineDiversityMode {
    /// Normalized Euclidean distance over standardized metric columns.
    #[default]
    Scalar,
    /// Normalized Hamming distance between overlay perceptual hashes.
    Layout,
    /// A weighted blend of [`Self::Scalar`] and [`Self::Layout`].
    Hybrid,
}

impl MineDiversityMode {
    /// Returns the canonical lower-case name used in configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Layout => "layout",
            Self::Hybrid => "hybrid",
        }
    }

    /// Parses a diversity-mode name, accepting common aliases.
    ///
    /// # Errors
    /// Returns [`MineError::UnknownEnumValue`] when `s` matches no alias.
    pub fn parse(s: &str) -> Result<Self, MineError> {
        let key = normalize_key(s);
        let mode = match key.as_str() {
            "scalar" | "feature" | "features" => Self::Scalar,
            "layout" | "phash" | "perceptual" => Self::Layout,
            "hybrid" | "mixed" | "blend" => Self::Hybrid,
            _ => {
                return Err(MineError::UnknownEnumValue {
                    kind: "diversity mode",
                    value: s.to_owned(),
                });
            }
        };
        Ok(mode)
    }
}

impl fmt::Display for MineDiversityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared configuration for distance-space analyses (§4.9-§4.12).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceSpaceConfig {
    /// Which distance function to measure with.
    pub mode: MineDiversityMode,
    /// Blend weight for [`MineDiversityMode::Hybrid`], clamped to `[0, 1]`.
    pub layout_weight: f64,
    /// Whether standardization uses median/MAD (robust) or mean/stddev.
    pub robust_scaling: bool,
    /// Metric columns making up the scalar feature vector.
    pub metrics: Vec<MineMetric>,
}

impl Default for DistanceSpaceConfig {
    fn default() -> Self {
        Self {
            mode: MineDiversityMode::Scalar,
            layout_weight: 0.5,
            robust_scaling: true,
            metrics: vec![
                MineMetric::Population,
                MineMetric::Happiness,
                MineMetric::TrafficCongestion,
                MineMetric::SeaFloodFrac,
                MineMetric::PondMaxDepth,
                MineMetric::AvgLandValue,
                MineMetric::RoadDensity,
            ],
        }
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// A standardized feature matrix plus the distance-space configuration used
/// to build it, ready to answer pairwise distance queries by entry index.
pub struct DistanceSpace {
    /// `features[i][j]` is the standardized value of metric `j` for entry `i`.
    features: Vec<Vec<f64>>,
    /// Overlay pHash per entry, parallel to `features`.
    phashes: Vec<u64>,
    mode: MineDiversityMode,
    layout_weight: f64,
}

impl DistanceSpace {
    /// Standardizes `records[selection[*]]` per `cfg` and builds a ready-to-query
    /// distance space.
    #[must_use]
    pub fn build(records: &[MineRecord], selection: &[usize], cfg: &DistanceSpaceConfig) -> Self {
        let n = selection.len();
        let dim = cfg.metrics.len();
        let mut raw = vec![vec![0.0f64; dim]; n];
        for (row, &idx) in selection.iter().enumerate() {
            for (col, metric) in cfg.metrics.iter().enumerate() {
                let record = &records[idx];
                let v = metric.value(record);
                raw[row][col] = if v.is_finite() { v } else { 0.0 };
            }
        }

        let mut centers = vec![0.0f64; dim];
        let mut scales = vec![1.0f64; dim];
        for col in 0..dim {
            let mut column: Vec<f64> = raw.iter().map(|row| row[col]).collect();
            if cfg.robust_scaling {
                let med = median(&mut column.clone());
                let mut abs_dev: Vec<f64> = column.iter().map(|v| (v - med).abs()).collect();
                let mad = median(&mut abs_dev);
                centers[col] = med;
                scales[col] = if mad > 0.0 { mad * 1.4826 } else { 1.0 };
            } else {
                let mu = mean(&column);
                let variance = if column.len() > 1 {
                    column.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / column.len() as f64
                } else {
                    0.0
                };
                let sd = variance.sqrt();
                centers[col] = mu;
                scales[col] = if sd > 0.0 { sd } else { 1.0 };
            }
        }

        let features: Vec<Vec<f64>> = raw
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(col, &v)| (v - centers[col]) / scales[col])
                    .collect()
            })
            .collect();

        let phashes: Vec<u64> = selection.iter().map(|&idx| records[idx].overlay_phash).collect();

        Self {
            features,
            phashes,
            mode: cfg.mode,
            layout_weight: cfg.layout_weight.clamp(0.0, 1.0),
        }
    }

    /// Number of entries in this space.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether this space has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature-vector dimensionality.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    fn scalar_distance(&self, i: usize, j: usize) -> f64 {
        let dim = self.dim().max(1);
        let sq: f64 = self.features[i]
            .iter()
            .zip(self.features[j].iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        sq.sqrt() / (dim as f64).sqrt()
    }

    fn layout_distance(&self, i: usize, j: usize) -> f64 {
        f64::from(hamming_distance_64(self.phashes[i], self.phashes[j])) / 64.0
    }

    /// Distance between entries `i` and `j` in this space's configured mode.
    #[must_use]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        match self.mode {
            MineDiversityMode::Scalar => self.scalar_distance(i, j),
            MineDiversityMode::Layout => self.layout_distance(i, j),
            MineDiversityMode::Hybrid => {
                let scalar = self.scalar_distance(i, j);
                let layout = self.layout_distance(i, j);
                (1.0 - self.layout_weight) * scalar + self.layout_weight * layout
            }
        }
    }

    /// Builds a closure over `i64` ids suitable for [`crate::vptree::VpTree::build`],
    /// where ids are indices `0..self.len()` cast to `i64`.
    #[must_use]
    pub fn as_distance_fn(&self) -> impl Fn(i64, i64) -> f64 + '_ {
        move |a: i64, b: i64| self.distance(a as usize, b as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MineRecord;

    fn record_with(population: i32, phash: u64) -> MineRecord {
        let mut r = MineRecord::default();
        r.stats.population = population;
        r.overlay_phash = phash;
        r
    }

    #[test]
    fn scalar_distance_is_zero_for_identical_records() {
        let records = vec![record_with(100, 0xAAAA), record_with(100, 0xAAAA)];
        let cfg = DistanceSpaceConfig {
            mode: MineDiversityMode::Scalar,
            metrics: vec![MineMetric::Population],
            ..DistanceSpaceConfig::default()
        };
        let space = DistanceSpace::build(&records, &[0, 1], &cfg);
        assert!((space.distance(0, 1)).abs() < 1e-12);
    }

    #[test]
    fn layout_distance_matches_normalized_hamming() {
        let records = vec![record_with(0, 0b0000), record_with(0, 0b1111)];
        let cfg = DistanceSpaceConfig {
            mode: MineDiversityMode::Layout,
            ..DistanceSpaceConfig::default()
        };
        let space = DistanceSpace::build(&records, &[0, 1], &cfg);
        assert!((space.distance(0, 1) - 4.0 / 64.0).abs() < 1e-12);
    }

    #[test]
    fn hybrid_blends_scalar_and_layout() {
        let records = vec![record_with(0, 0b0000), record_with(200, 0b1111)];
        let cfg = DistanceSpaceConfig {
            mode: MineDiversityMode::Hybrid,
            layout_weight: 0.5,
            metrics: vec![MineMetric::Population],
            ..DistanceSpaceConfig::default()
        };
        let space = DistanceSpace::build(&records, &[0, 1], &cfg);
        let scalar_only = DistanceSpace::build(
            &records,
            &[0, 1],
            &DistanceSpaceConfig {
                mode: MineDiversityMode::Scalar,
                metrics: vec![MineMetric::Population],
                ..DistanceSpaceConfig::default()
            },
        );
        let layout_only = DistanceSpace::build(
            &records,
            &[0, 1],
            &DistanceSpaceConfig {
                mode: MineDiversityMode::Layout,
                ..DistanceSpaceConfig::default()
            },
        );
        let expected = 0.5 * scalar_only.distance(0, 1) + 0.5 * layout_only.distance(0, 1);
        assert!((space.distance(0, 1) - expected).abs() < 1e-9);
    }

    #[test]
    fn robust_scaling_falls_back_to_one_on_zero_mad() {
        let records = vec![record_with(50, 0), record_with(50, 0), record_with(50, 0)];
        let cfg = DistanceSpaceConfig {
            metrics: vec![MineMetric::Population],
            robust_scaling: true,
            ..DistanceSpaceConfig::default()
        };
        let space = DistanceSpace::build(&records, &[0, 1, 2], &cfg);
        assert!((space.distance(0, 1)).abs() < 1e-12);
    }

    #[test]
    fn diversity_mode_parse_roundtrips() {
        for mode in [
            MineDiversityMode::Scalar,
            MineDiversityMode::Layout,
            MineDiversityMode::Hybrid,
        ] {
            assert_eq!(MineDiversityMode::parse(mode.name()).unwrap(), mode);
        }
    }
}
