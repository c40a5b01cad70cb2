use std::collections::HashMap;

use super::{AssociationKind, PairStrength};
use crate::series::{is_flat, mean, SeriesSet};

/// Pearson correlation coefficient of two equal-length series.
///
/// Returns 0 when either series has no variance. The result is clamped to
/// `[-1, 1]` and is exactly symmetric in its arguments.
///
/// # Panics
///
/// Panics when the series lengths differ.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "correlated series must have equal length");

    if is_flat(a) || is_flat(b) {
        return 0.0;
    }

    let (mean_x, mean_y) = (mean(a), mean(b));
    let (mut covariance, mut spread_x, mut spread_y) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_x, y - mean_y);
        covariance += dx * dy;
        spread_x += dx * dx;
        spread_y += dy * dy;
    }

    let denominator = (spread_x * spread_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    (covariance / denominator).clamp(-1.0, 1.0)
}

/// Pairwise correlations over the series of one [`SeriesSet`], computed on
/// lookup.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix<'a> {
    series: HashMap<&'a str, &'a [f64]>,
    keys: Vec<&'a str>,
    threshold: f64,
}

impl<'a> CorrelationMatrix<'a> {
    pub fn new(set: &'a SeriesSet, threshold: f64) -> Self {
        let keys: Vec<&str> = set.series.iter().map(|series| series.key.as_str()).collect();
        let series =
            set.series.iter().map(|series| (series.key.as_str(), series.values.as_slice())).collect();
        Self { series, keys, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        let left = self.series.get(a)?;
        let right = self.series.get(b)?;
        Some(pearson(left, right))
    }
}

impl PairStrength for CorrelationMatrix<'_> {
    fn kind(&self) -> AssociationKind {
        AssociationKind::Correlation
    }

    fn strength(&self, a: &str, b: &str) -> Option<f64> {
        self.correlation(a, b)
    }

    fn minimum_strength(&self) -> f64 {
        self.threshold
    }

    fn associations_of(&self, sku: &str) -> Vec<(String, f64)> {
        let mut partners: Vec<(String, f64)> = self
            .keys
            .iter()
            .filter(|key| **key != sku)
            .filter_map(|key| {
                let r = self.correlation(sku, key)?;
                (r >= self.threshold).then(|| (key.to_string(), r))
            })
            .collect();
        partners.sort_by(|left, right| right.1.total_cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
        partners
    }
}
