use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::series::{mean, SeriesSet};

pub const DEFAULT_TRAILING_MONTHS: u32 = 3;
pub const DEFAULT_THRESHOLD_PERCENTILE: f64 = 75.0;
pub const DEFAULT_SAFE_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_CONSERVATIVE_MULTIPLIER: f64 = 1.5;

/// Sales level separating `safe` from `conservative` margins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum SafetyThreshold {
    Fixed(f64),
    /// Percentile of the positive trailing averages across all SKUs.
    AutoPercentile(f64),
}

impl std::fmt::Display for SafetyThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(value) => write!(f, "{value}"),
            Self::AutoPercentile(percentile) => write!(f, "auto:{percentile}"),
        }
    }
}

impl std::str::FromStr for SafetyThreshold {
    type Err = String;

    /// Accepts `auto`, `auto:<percentile>` or a plain number.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        if value == "auto" {
            return Ok(Self::AutoPercentile(DEFAULT_THRESHOLD_PERCENTILE));
        }
        if let Some(percentile) = value.strip_prefix("auto:") {
            return percentile
                .trim()
                .parse::<f64>()
                .map(Self::AutoPercentile)
                .map_err(|_| format!("invalid safety percentile `{percentile}`"));
        }
        value
            .parse::<f64>()
            .map(Self::Fixed)
            .map_err(|_| format!("invalid safety threshold `{value}` (expected auto, auto:<p> or a number)"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub trailing_months: u32,
    pub threshold: SafetyThreshold,
    pub safe_multiplier: f64,
    pub conservative_multiplier: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            trailing_months: DEFAULT_TRAILING_MONTHS,
            threshold: SafetyThreshold::AutoPercentile(DEFAULT_THRESHOLD_PERCENTILE),
            safe_multiplier: DEFAULT_SAFE_MULTIPLIER,
            conservative_multiplier: DEFAULT_CONSERVATIVE_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginType {
    Safe,
    Conservative,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginReason {
    AboveThreshold,
    BelowThreshold,
    NoSalesInWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyMargin {
    pub sku: String,
    pub trailing_average: f64,
    pub threshold: f64,
    pub is_above_threshold: bool,
    pub margin_type: MarginType,
    pub recommended_stock: u64,
    pub reason: MarginReason,
}

/// Linear-interpolated percentile (`0..=100`) of `values`; 0 when empty.
pub fn percentile(values: &[f64], percentile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (percentile.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

#[derive(Debug, Clone, Default)]
pub struct SafetyMarginCalculator {
    config: SafetyConfig,
}

impl SafetyMarginCalculator {
    pub fn new(config: SafetyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    pub fn trailing_average(&self, values: &[f64]) -> f64 {
        let start = values.len().saturating_sub(self.config.trailing_months as usize);
        mean(&values[start..])
    }

    /// Resolve the configured threshold against the trailing averages.
    pub fn resolve_threshold(&self, trailing_averages: &[f64]) -> f64 {
        match self.config.threshold {
            SafetyThreshold::Fixed(value) => value,
            SafetyThreshold::AutoPercentile(p) => {
                let positive: Vec<f64> = trailing_averages
                    .iter()
                    .copied()
                    .filter(|value| value.is_finite() && *value > 0.0)
                    .collect();
                percentile(&positive, p)
            }
        }
    }

    /// Margins for every series, in series order.
    pub fn calculate(&self, set: &SeriesSet) -> Vec<SafetyMargin> {
        let averages: Vec<f64> =
            set.series.iter().map(|series| self.trailing_average(&series.values)).collect();
        let threshold = self.resolve_threshold(&averages);

        debug!(
            event_name = "analytics.safety.threshold_resolved",
            threshold,
            trailing_months = self.config.trailing_months,
            sku_count = averages.len(),
            "safety threshold resolved"
        );

        set.series
            .iter()
            .zip(averages)
            .map(|(series, average)| self.margin_for(&series.key, average, threshold))
            .collect()
    }

    pub fn margin_for(&self, sku: &str, trailing_average: f64, threshold: f64) -> SafetyMargin {
        let (margin_type, reason, recommended_stock) =
            if !trailing_average.is_finite() || trailing_average <= 0.0 {
                (MarginType::None, MarginReason::NoSalesInWindow, 0)
            } else if trailing_average >= threshold {
                (
                    MarginType::Safe,
                    MarginReason::AboveThreshold,
                    (trailing_average * self.config.safe_multiplier).ceil() as u64,
                )
            } else {
                (
                    MarginType::Conservative,
                    MarginReason::BelowThreshold,
                    (trailing_average * self.config.conservative_multiplier).ceil() as u64,
                )
            };

        SafetyMargin {
            sku: sku.to_string(),
            trailing_average,
            threshold,
            is_above_threshold: margin_type == MarginType::Safe,
            margin_type,
            recommended_stock,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{MonthKey, MonthWindow, MonthlySeries};

    fn fixed(threshold: f64) -> SafetyMarginCalculator {
        SafetyMarginCalculator::new(SafetyConfig {
            threshold: SafetyThreshold::Fixed(threshold),
            ..SafetyConfig::default()
        })
    }

    #[test]
    fn zero_sales_means_no_margin() {
        let margin = fixed(10.0).margin_for("SKU", 0.0, 10.0);
        assert_eq!(margin.margin_type, MarginType::None);
        assert_eq!(margin.recommended_stock, 0);
        assert_eq!(margin.reason, MarginReason::NoSalesInWindow);

        let margin = fixed(10.0).margin_for("SKU", f64::NAN, 10.0);
        assert_eq!(margin.margin_type, MarginType::None);
    }

    #[test]
    fn safe_and_conservative_multipliers() {
        let calculator = fixed(10.0);
        let safe = calculator.margin_for("SKU", 12.0, 10.0);
        assert_eq!(safe.margin_type, MarginType::Safe);
        assert_eq!(safe.recommended_stock, 24);

        let conservative = calculator.margin_for("SKU", 5.0, 10.0);
        assert_eq!(conservative.margin_type, MarginType::Conservative);
        assert_eq!(conservative.recommended_stock, 8);

        let boundary = calculator.margin_for("SKU", 10.0, 10.0);
        assert_eq!(boundary.margin_type, MarginType::Safe);
        assert!(boundary.is_above_threshold);
        assert!(!conservative.is_above_threshold);
    }

    #[test]
    fn recommended_stock_never_decreases_with_sales() {
        let calculator = fixed(10.0);
        let mut previous = 0;
        for step in 0..=400 {
            let average = step as f64 * 0.05;
            let stock = calculator.margin_for("SKU", average, 10.0).recommended_stock;
            assert!(stock >= previous, "stock dropped at average {average}");
            previous = stock;
        }
    }

    #[test]
    fn percentile_interpolates() {
        assert_eq!(percentile(&[], 75.0), 0.0);
        assert_eq!(percentile(&[4.0], 75.0), 4.0);
        assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0, 5.0], 50.0), 3.0);
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 75.0), 3.25);
        assert_eq!(percentile(&[1.0, 2.0], 100.0), 2.0);
    }

    #[test]
    fn auto_threshold_ignores_skus_without_sales() {
        let set = SeriesSet {
            window: MonthWindow::ending_at(MonthKey::new(2024, 6), 6),
            series: vec![
                MonthlySeries::from_values("FAST", vec![0.0, 0.0, 0.0, 9.0, 12.0, 15.0]),
                MonthlySeries::from_values("SLOW", vec![5.0, 5.0, 5.0, 1.0, 2.0, 3.0]),
                MonthlySeries::from_values("DEAD", vec![7.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ],
            skipped_undated: 0,
            outside_window: 0,
        };

        let margins = SafetyMarginCalculator::default().calculate(&set);

        // Trailing averages 12 and 2; the 75th percentile of [2, 12] is 9.5.
        assert_eq!(margins[0].threshold, 9.5);
        assert_eq!(margins[0].margin_type, MarginType::Safe);
        assert_eq!(margins[0].recommended_stock, 24);
        assert_eq!(margins[1].margin_type, MarginType::Conservative);
        assert_eq!(margins[1].recommended_stock, 3);
        assert_eq!(margins[2].margin_type, MarginType::None);
        assert_eq!(margins[2].recommended_stock, 0);
    }

    #[test]
    fn threshold_parses_from_text() {
        assert_eq!("auto".parse::<SafetyThreshold>(), Ok(SafetyThreshold::AutoPercentile(75.0)));
        assert_eq!("auto:90".parse::<SafetyThreshold>(), Ok(SafetyThreshold::AutoPercentile(90.0)));
        assert_eq!("12.5".parse::<SafetyThreshold>(), Ok(SafetyThreshold::Fixed(12.5)));
        assert!("lots".parse::<SafetyThreshold>().is_err());
    }
}
