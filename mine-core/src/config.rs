//! Run configuration: [`MineConfig`], scoring objectives, and the derived
//! [`ScoreWeights`] used by [`crate::mine_one`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MineError;
use crate::sampler::{SeedSampler, normalize_key};

/// Named scoring presets. Each resolves to a concrete [`ScoreWeights`] vector
/// via [`MineObjective::weights`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum MineObjective {
    /// General-purpose balance of growth, happiness, and flood resilience.
    #[default]
    Balanced,
    /// Favours population and money growth; tolerates more risk.
    Growth,
    /// Favours happiness and strongly penalizes flooding/ponding.
    Resilient,
    /// Inverts the "healthy city" incentives to stress-test flood/congestion paths.
    Chaos,
}

impl MineObjective {
    /// Returns the canonical lower-case name used in configuration and CSV output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Growth => "growth",
            Self::Resilient => "resilient",
            Self::Chaos => "chaos",
        }
    }

    /// Parses an objective name, accepting common aliases.
    ///
    /// # Errors
    /// Returns [`MineError::UnknownEnumValue`] when `s` matches no alias.
    pub fn parse(s: &str) -> Result<Self, MineError> {
        let key = normalize_key(s);
        let objective = match key.as_str() {
            "balanced" | "default" => Self::Balanced,
            "growth" => Self::Growth,
            "resilient" | "resilience" => Self::Resilient,
            "chaos" | "stress" => Self::Chaos,
            _ => {
                return Err(MineError::UnknownEnumValue {
                    kind: "objective",
                    value: s.to_owned(),
                });
            }
        };
        Ok(objective)
    }

    /// Resolves this objective into its concrete weight vector.
    #[must_use]
    pub const fn weights(self) -> ScoreWeights {
        match self {
            Self::Balanced => ScoreWeights::BALANCED,
            Self::Growth => ScoreWeights::GROWTH,
            Self::Resilient => ScoreWeights::RESILIENT,
            Self::Chaos => ScoreWeights::CHAOS,
        }
    }
}

impl fmt::Display for MineObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coefficients used by [`crate::mine_one::compute_score`].
///
/// Values are preserved verbatim per objective; do not "simplify" the
/// literal coefficients, the relative scale between terms is deliberate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreWeights {
    /// Weight on raw population.
    pub w_population: f64,
    /// Weight on happiness (additionally scaled by population in
    /// [`crate::mine_one::compute_score`]).
    pub w_happiness: f64,
    /// Weight on treasury money.
    pub w_money: f64,
    /// Weight on mean land value.
    pub w_land_value: f64,
    /// Weight on goods-satisfaction.
    pub w_goods_satisfaction: f64,
    /// Weight on services satisfaction (additionally scaled by population).
    pub w_services_satisfaction: f64,
    /// Penalty weight on traffic congestion.
    pub p_congestion: f64,
    /// Penalty weight on sea-flood area fraction.
    pub p_sea_frac: f64,
    /// Penalty weight on sea-flood maximum depth.
    pub p_sea_max_depth: f64,
    /// Penalty weight on pond area fraction.
    pub p_pond_frac: f64,
    /// Penalty weight on pond maximum depth.
    pub p_pond_max_depth: f64,
}

impl ScoreWeights {
    /// Balanced preset: the baseline weight vector other objectives perturb.
    pub const BALANCED: Self = Self {
        w_population: 1.0,
        w_happiness: 1800.0,
        w_money: 0.05,
        w_land_value: 900.0,
        w_goods_satisfaction: 700.0,
        w_services_satisfaction: 500.0,
        p_congestion: 1400.0,
        p_sea_frac: 1000.0,
        p_sea_max_depth: 2500.0,
        p_pond_frac: 700.0,
        p_pond_max_depth: 2000.0,
    };

    /// Growth preset: heavier population/money weight, lighter flood penalties.
    pub const GROWTH: Self = Self {
        w_population: 1.4,
        w_money: 0.08,
        p_congestion: 1000.0,
        p_sea_frac: 650.0,
        p_sea_max_depth: 1600.0,
        p_pond_frac: 500.0,
        p_pond_max_depth: 1200.0,
        ..Self::BALANCED
    };

    /// Resilient preset: lighter population weight, heavier happiness and flood penalties.
    pub const RESILIENT: Self = Self {
        w_population: 0.9,
        w_happiness: 2000.0,
        p_congestion: 1500.0,
        p_sea_frac: 1600.0,
        p_sea_max_depth: 5200.0,
        p_pond_frac: 1400.0,
        p_pond_max_depth: 4200.0,
        ..Self::BALANCED
    };

    /// Chaos preset: inverts the "healthy city" incentives so floods,
    /// ponding, and congestion become rewards rather than penalties.
    pub const CHAOS: Self = Self {
        w_population: 0.2,
        w_happiness: -1200.0,
        w_money: -0.05,
        w_land_value: -700.0,
        w_goods_satisfaction: -600.0,
        w_services_satisfaction: -600.0,
        p_congestion: -2500.0,
        p_sea_frac: -1800.0,
        p_sea_max_depth: -5200.0,
        p_pond_frac: -2200.0,
        p_pond_max_depth: -6200.0,
    };
}

/// Immutable input to a mining run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MineConfig {
    /// First enumeration base in the seed sequence.
    pub seed_start: u64,
    /// Stride between successive enumeration bases.
    pub seed_step: u64,
    /// Value XORed into every resolved seed.
    pub seed_xor: u64,
    /// Seed sampling strategy.
    pub seed_sampler: SeedSampler,
    /// Number of samples to mine (batch mode only).
    pub samples: i32,
    /// World width in tiles. Must be positive.
    pub w: i32,
    /// World height in tiles. Must be positive.
    pub h: i32,
    /// Number of simulated days per seed. Must be non-negative.
    pub days: i32,
    /// Worker thread count; `<= 0` resolves to available parallelism.
    pub threads: i32,
    /// Scoring preset.
    pub objective: MineObjective,
    /// Optional score-overriding expression; empty disables it.
    pub score_expr: String,
    /// Whether sea-flood and depression analysis run at all.
    pub hydrology_enabled: bool,
    /// Explicit sea level; `NaN` uses the proc-gen config's water level.
    pub sea_level_override: f32,
    /// Only count sea-flood cells connected to the map edge.
    pub sea_require_edge_connection: bool,
    /// Use 8-neighbourhood connectivity for sea-flood connectivity.
    pub sea_eight_connected: bool,
    /// Minimum lift used by depression filling.
    pub depression_epsilon: f32,
}

impl Default for MineConfig {
    fn default() -> Self {
        Self {
            seed_start: 1,
            seed_step: 1,
            seed_xor: 0,
            seed_sampler: SeedSampler::Linear,
            samples: 100,
            w: 96,
            h: 96,
            days: 120,
            threads: 1,
            objective: MineObjective::Balanced,
            score_expr: String::new(),
            hydrology_enabled: true,
            sea_level_override: f32::NAN,
            sea_require_edge_connection: true,
            sea_eight_connected: false,
            depression_epsilon: 0.0,
        }
    }
}

impl MineConfig {
    /// Validates the fields the driver must reject before mining starts.
    ///
    /// # Errors
    /// Returns [`MineError::InvalidWorldSize`] when `w`/`h` is not positive,
    /// and [`MineError::InvalidSampleCount`]/[`MineError::InvalidDayCount`]
    /// when `samples`/`days` is negative.
    pub fn validate(&self) -> Result<(), MineError> {
        if self.w <= 0 || self.h <= 0 {
            return Err(MineError::InvalidWorldSize {
                w: self.w,
                h: self.h,
            });
        }
        if self.samples < 0 {
            return Err(MineError::InvalidSampleCount { got: self.samples });
        }
        if self.days < 0 {
            return Err(MineError::InvalidDayCount { got: self.days });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_inherits_balanced_happiness_weight() {
        assert_eq!(
            ScoreWeights::GROWTH.w_happiness,
            ScoreWeights::BALANCED.w_happiness
        );
    }

    #[test]
    fn chaos_inverts_penalty_signs() {
        assert!(ScoreWeights::CHAOS.p_congestion < 0.0);
        assert!(ScoreWeights::CHAOS.w_happiness < 0.0);
    }

    #[test]
    fn default_config_rejects_are_validated() {
        let mut cfg = MineConfig::default();
        cfg.w = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(MineConfig::default().validate().is_ok());
    }

    #[test]
    fn objective_parse_roundtrips_name() {
        for objective in [
            MineObjective::Balanced,
            MineObjective::Growth,
            MineObjective::Resilient,
            MineObjective::Chaos,
        ] {
            assert_eq!(MineObjective::parse(objective.name()).unwrap(), objective);
        }
    }
}
