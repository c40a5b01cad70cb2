//! Stock recommendations: per-SKU safety margins and association-driven
//! momentum adjustments.

mod momentum;
mod safety;

pub use momentum::{
    momentum, ForecastAdjustment, ForecastDriver, MomentumConfig, MomentumForecastAdjuster,
    MAX_DRIVERS,
};
pub use safety::{
    percentile, MarginReason, MarginType, SafetyConfig, SafetyMargin, SafetyMarginCalculator,
    SafetyThreshold,
};

use serde::{Deserialize, Serialize};

use crate::abc::AbcClass;

/// Months of cover held per ABC class before momentum adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMultipliers {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl StockMultipliers {
    pub fn for_class(&self, class: AbcClass) -> f64 {
        match class {
            AbcClass::A => self.a,
            AbcClass::B => self.b,
            AbcClass::C => self.c,
        }
    }
}

impl Default for StockMultipliers {
    fn default() -> Self {
        Self { a: 2.0, b: 1.5, c: 1.0 }
    }
}
