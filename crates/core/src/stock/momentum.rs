use serde::{Deserialize, Serialize};

use crate::association::AssociationKind;
use crate::series::{is_flat, mean, population_std_dev, SeriesSet};

pub const DEFAULT_ALPHA: f64 = 0.15;
pub const DEFAULT_MAX_ADJUSTMENT: f64 = 0.5;

/// Drivers reported per adjustment.
pub const MAX_DRIVERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumConfig {
    /// Sensitivity of the factor to weighted momentum.
    pub alpha: f64,
    /// The factor stays within `1 ± max_adjustment`.
    pub max_adjustment: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self { alpha: DEFAULT_ALPHA, max_adjustment: DEFAULT_MAX_ADJUSTMENT }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDriver {
    pub sku: String,
    pub strength: f64,
    pub momentum: f64,
    /// `strength * momentum`.
    pub contribution: f64,
    pub kind: AssociationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastAdjustment {
    pub sku: String,
    pub base_recommendation: f64,
    pub weighted_momentum: f64,
    pub adjustment_factor: f64,
    pub adjusted_recommendation: u64,
    pub drivers: Vec<ForecastDriver>,
}

/// z-score of the latest value against the series mean; 0 without variance.
pub fn momentum(values: &[f64]) -> f64 {
    let Some(latest) = values.last().copied() else {
        return 0.0;
    };
    let std_dev = population_std_dev(values);
    if std_dev <= f64::EPSILON || is_flat(values) {
        return 0.0;
    }
    (latest - mean(values)) / std_dev
}

#[derive(Debug, Clone, Default)]
pub struct MomentumForecastAdjuster {
    config: MomentumConfig,
}

impl MomentumForecastAdjuster {
    pub fn new(config: MomentumConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MomentumConfig {
        &self.config
    }

    /// Adjust `base_recommendation` by the momentum of associated SKUs.
    ///
    /// Associations whose SKU has no series in `set` are ignored.
    pub fn adjust(
        &self,
        sku: &str,
        base_recommendation: f64,
        associations: &[(String, f64)],
        kind: AssociationKind,
        set: &SeriesSet,
    ) -> ForecastAdjustment {
        let mut drivers: Vec<ForecastDriver> = associations
            .iter()
            .filter(|(associated, _)| associated != sku)
            .filter_map(|(associated, strength)| {
                let series = set.get(associated)?;
                let momentum = momentum(&series.values);
                Some(ForecastDriver {
                    sku: associated.clone(),
                    strength: *strength,
                    momentum,
                    contribution: strength * momentum,
                    kind,
                })
            })
            .collect();

        let strength_sum: f64 = drivers.iter().map(|driver| driver.strength).sum();
        let weighted_momentum = if drivers.is_empty() || strength_sum <= 0.0 {
            0.0
        } else {
            drivers.iter().map(|driver| driver.contribution).sum::<f64>() / strength_sum
        };

        let bound = self.config.max_adjustment;
        let adjustment_factor =
            (1.0 + self.config.alpha * weighted_momentum).clamp(1.0 - bound, 1.0 + bound);
        let adjusted_recommendation = (base_recommendation * adjustment_factor).round().max(0.0) as u64;

        drivers.sort_by(|left, right| {
            right
                .contribution
                .abs()
                .total_cmp(&left.contribution.abs())
                .then_with(|| left.sku.cmp(&right.sku))
        });
        drivers.truncate(MAX_DRIVERS);

        ForecastAdjustment {
            sku: sku.to_string(),
            base_recommendation,
            weighted_momentum,
            adjustment_factor,
            adjusted_recommendation,
            drivers,
        }
    }
}
