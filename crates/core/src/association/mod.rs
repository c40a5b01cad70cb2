//! Product association sources.
//!
//! Two interchangeable ways of saying "these SKUs sell together":
//! monthly-series correlation and order-basket rule mining. Both expose the
//! same [`PairStrength`] seam so kit ranking and forecasting do not care
//! which one produced the numbers.

mod basket;
mod correlation;

pub use basket::{AssociationRule, Basket, BasketAssociationMiner, BasketConfig, BasketRules};
pub use correlation::{pearson, CorrelationMatrix};

use serde::{Deserialize, Serialize};

/// Significance cutoff for Pearson's r with twelve observations (p < 0.05).
pub const SIGNIFICANT_CORRELATION_N12: f64 = 0.576;

/// Default rules kept per antecedent SKU.
pub const DEFAULT_RULES_PER_SKU: usize = 10;

/// Default basket-mining minimums.
pub const DEFAULT_MIN_SUPPORT: f64 = 0.01;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.3;
pub const DEFAULT_MIN_LIFT: f64 = 1.0;

/// Which association method a recompute uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMethod {
    /// Basket mining when orders carry multi-product baskets, else correlation.
    Auto,
    Correlation,
    Basket,
}

impl AssociationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Correlation => "correlation",
            Self::Basket => "basket",
        }
    }

    /// Resolve `Auto` against what the data can support.
    pub fn resolve(self, has_multi_item_baskets: bool) -> AssociationKind {
        match self {
            Self::Correlation => AssociationKind::Correlation,
            Self::Basket => AssociationKind::Basket,
            Self::Auto if has_multi_item_baskets => AssociationKind::Basket,
            Self::Auto => AssociationKind::Correlation,
        }
    }
}

impl std::str::FromStr for AssociationMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "correlation" => Ok(Self::Correlation),
            "basket" | "basket_mining" => Ok(Self::Basket),
            other => Err(format!(
                "unsupported association method `{other}` (expected auto|correlation|basket)"
            )),
        }
    }
}

/// The method that actually produced an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    Correlation,
    Basket,
}

impl AssociationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correlation => "correlation",
            Self::Basket => "basket",
        }
    }
}

/// A source of pairwise association strengths.
pub trait PairStrength {
    fn kind(&self) -> AssociationKind;

    /// Strength of the unordered pair, `None` when the source knows nothing
    /// about one of the SKUs.
    fn strength(&self, a: &str, b: &str) -> Option<f64>;

    /// Minimum strength a pair needs to be retained.
    fn minimum_strength(&self) -> f64;

    /// Associations flowing out of `sku`, strongest first.
    fn associations_of(&self, sku: &str) -> Vec<(String, f64)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_method_prefers_baskets_when_available() {
        assert_eq!(AssociationMethod::Auto.resolve(true), AssociationKind::Basket);
        assert_eq!(AssociationMethod::Auto.resolve(false), AssociationKind::Correlation);
        assert_eq!(AssociationMethod::Correlation.resolve(true), AssociationKind::Correlation);
        assert_eq!(AssociationMethod::Basket.resolve(false), AssociationKind::Basket);
    }

    #[test]
    fn method_parses_from_text() {
        assert_eq!("Basket".parse::<AssociationMethod>(), Ok(AssociationMethod::Basket));
        assert_eq!(" auto ".parse::<AssociationMethod>(), Ok(AssociationMethod::Auto));
        assert!("apriori".parse::<AssociationMethod>().is_err());
    }
}
