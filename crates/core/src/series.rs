//! Fixed-width monthly series.
//!
//! Every series produced here has exactly one value per month of the
//! analysis window; months without sales are explicit zeros.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::abc::{AbcClass, AbcClassifier, AbcThresholds, EntityAggregate};
use crate::config::SkuFlagConfig;
use crate::domain::TransactionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        assert!((1..=12).contains(&month), "month must be in 1..=12, got {month}");
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self { year: ordinal.div_euclid(12) as i32, month: ordinal.rem_euclid(12) as u32 + 1 }
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// How the window is positioned in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAnchor {
    /// January..December of the given year.
    CalendarYear(i32),
    /// Window whose last month contains the given date.
    EndingAt(NaiveDate),
    /// Window ending at the most recent dated record, or `fallback` when
    /// nothing is dated.
    LatestRecord { fallback: NaiveDate },
}

/// Ordered run of consecutive months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWindow {
    months: Vec<MonthKey>,
}

impl MonthWindow {
    /// # Panics
    ///
    /// Panics when `len` is zero.
    pub fn ending_at(last: MonthKey, len: usize) -> Self {
        assert!(len > 0, "month window must contain at least one month");
        let end = last.ordinal();
        let start = end - len as i64 + 1;
        Self { months: (start..=end).map(MonthKey::from_ordinal).collect() }
    }

    pub fn calendar_year(year: i32) -> Self {
        Self::ending_at(MonthKey::new(year, 12), 12)
    }

    pub fn months(&self) -> &[MonthKey] {
        &self.months
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn first(&self) -> Option<MonthKey> {
        self.months.first().copied()
    }

    pub fn last(&self) -> Option<MonthKey> {
        self.months.last().copied()
    }

    pub fn position(&self, key: MonthKey) -> Option<usize> {
        let first = self.first()?.ordinal();
        let offset = key.ordinal() - first;
        (0..self.len() as i64).contains(&offset).then_some(offset as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries {
    pub key: String,
    pub values: Vec<f64>,
    /// Records folded into this series.
    pub record_count: u64,
}

impl MonthlySeries {
    pub fn zeros(key: impl Into<String>, len: usize) -> Self {
        Self { key: key.into(), values: vec![0.0; len], record_count: 0 }
    }

    pub fn from_values(key: impl Into<String>, values: Vec<f64>) -> Self {
        Self { key: key.into(), values, record_count: 0 }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn mean(&self) -> f64 {
        mean(&self.values)
    }

    pub fn std_dev(&self) -> f64 {
        population_std_dev(&self.values)
    }

    /// The last `periods` values (all of them when the series is shorter).
    pub fn trailing(&self, periods: usize) -> &[f64] {
        let start = self.values.len().saturating_sub(periods);
        &self.values[start..]
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Centred spreads smaller than this share of the raw sum of squares are
/// rounding residue.
const FLAT_SPREAD_RATIO: f64 = 1e-20;

/// Sum of squared deviations from the mean.
pub fn centred_spread(values: &[f64]) -> f64 {
    let avg = mean(values);
    values.iter().map(|value| (value - avg).powi(2)).sum()
}

/// True when the series has no variance beyond floating-point residue, e.g.
/// twelve months of a steady `0.1`.
pub fn is_flat(values: &[f64]) -> bool {
    let scale: f64 = values.iter().map(|value| value * value).sum();
    centred_spread(values) <= scale * FLAT_SPREAD_RATIO
}

pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (centred_spread(values) / values.len() as f64).sqrt()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSet {
    pub window: MonthWindow,
    /// First-seen order.
    pub series: Vec<MonthlySeries>,
    pub skipped_undated: u64,
    pub outside_window: u64,
}

impl SeriesSet {
    pub fn get(&self, key: &str) -> Option<&MonthlySeries> {
        self.series.iter().find(|series| series.key == key)
    }

    pub fn as_map(&self) -> HashMap<&str, &MonthlySeries> {
        self.series.iter().map(|series| (series.key.as_str(), series)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct MonthlyAggregator {
    window_len: usize,
}

impl MonthlyAggregator {
    /// # Panics
    ///
    /// Panics when `window_len` is zero.
    pub fn new(window_len: usize) -> Self {
        assert!(window_len > 0, "analysis window must contain at least one month");
        Self { window_len }
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn resolve_window(&self, records: &[TransactionRecord], anchor: WindowAnchor) -> MonthWindow {
        match anchor {
            WindowAnchor::CalendarYear(year) => MonthWindow::calendar_year(year),
            WindowAnchor::EndingAt(date) => {
                MonthWindow::ending_at(MonthKey::from_date(date), self.window_len)
            }
            WindowAnchor::LatestRecord { fallback } => {
                let latest =
                    records.iter().filter_map(|record| record.date).max().unwrap_or(fallback);
                MonthWindow::ending_at(MonthKey::from_date(latest), self.window_len)
            }
        }
    }

    /// Per-SKU quantity series.
    pub fn aggregate(&self, records: &[TransactionRecord], anchor: WindowAnchor) -> SeriesSet {
        self.aggregate_by(records, anchor, |record| record.product.as_str(), |record| record.quantity)
    }

    pub fn aggregate_by<K, V>(
        &self,
        records: &[TransactionRecord],
        anchor: WindowAnchor,
        key: K,
        value: V,
    ) -> SeriesSet
    where
        K: Fn(&TransactionRecord) -> &str,
        V: Fn(&TransactionRecord) -> f64,
    {
        let window = self.resolve_window(records, anchor);
        let width = window.len();

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut series: Vec<MonthlySeries> = Vec::new();
        let mut skipped_undated = 0u64;
        let mut outside_window = 0u64;

        for record in records {
            let Some(date) = record.date else {
                skipped_undated += 1;
                continue;
            };

            let series_key = key(record);
            let slot = *index.entry(series_key).or_insert_with(|| {
                series.push(MonthlySeries::zeros(series_key, width));
                series.len() - 1
            });

            match window.position(MonthKey::from_date(date)) {
                Some(position) => {
                    let target = &mut series[slot];
                    target.values[position] += value(record);
                    target.record_count += 1;
                }
                None => outside_window += 1,
            }
        }

        debug!(
            event_name = "analytics.series.aggregated",
            window_start = window.first().map(|month| month.label()).unwrap_or_default(),
            window_end = window.last().map(|month| month.label()).unwrap_or_default(),
            series_count = series.len(),
            skipped_undated,
            outside_window,
            "monthly series aggregated"
        );

        SeriesSet { window, series, skipped_undated, outside_window }
    }
}

/// Per-SKU figures derived from a monthly series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuMetrics {
    pub sku: String,
    pub total_sales: f64,
    /// Smallest monthly value, zero months included.
    pub min_sale: f64,
    /// Largest monthly value, zero months included.
    pub max_sale: f64,
    /// Average over months with sales.
    pub average_total: f64,
    /// `total_sales / window length`.
    pub average_monthly: f64,
    pub months_with_sales: usize,
    pub class_label: AbcClass,
    pub rank: usize,
    pub is_best_seller: bool,
    pub is_visible: bool,
}

/// Derive metrics for every series, returned in rank order.
pub fn sku_metrics(
    set: &SeriesSet,
    thresholds: AbcThresholds,
    flags: &SkuFlagConfig,
) -> Vec<SkuMetrics> {
    let by_key = set.as_map();
    let aggregates = set
        .series
        .iter()
        .map(|series| {
            let total = series.total();
            EntityAggregate {
                key: series.key.clone(),
                total_value: total,
                total_quantity: total,
                record_count: series.record_count,
                average_unit_value: if total == 0.0 { 0.0 } else { 1.0 },
            }
        })
        .collect();

    let classification = AbcClassifier::new(thresholds).classify_aggregates(aggregates);
    let count = classification.entities.len();
    let best_seller_cutoff = top_share_cutoff(count, flags.best_seller_percent);
    let visible_cutoff = top_share_cutoff(count, flags.visible_percent);

    classification
        .entities
        .into_iter()
        .filter_map(|entity| {
            let series = by_key.get(entity.aggregate.key.as_str())?;
            let values = &series.values;
            let width = values.len();
            let total_sales = entity.aggregate.total_value;
            let months_with_sales = values.iter().filter(|value| **value != 0.0).count();
            let has_sales = total_sales > 0.0;

            Some(SkuMetrics {
                sku: entity.aggregate.key,
                total_sales,
                min_sale: values.iter().copied().reduce(f64::min).unwrap_or(0.0),
                max_sale: values.iter().copied().reduce(f64::max).unwrap_or(0.0),
                average_total: if months_with_sales == 0 {
                    0.0
                } else {
                    total_sales / months_with_sales as f64
                },
                average_monthly: if width == 0 { 0.0 } else { total_sales / width as f64 },
                months_with_sales,
                class_label: entity.class_label,
                rank: entity.rank,
                is_best_seller: has_sales && entity.rank <= best_seller_cutoff,
                is_visible: has_sales && entity.rank <= visible_cutoff,
            })
        })
        .collect()
}

/// Number of leading ranks that make up `percent` of `count` items (at least
/// one when there is anything to rank).
fn top_share_cutoff(count: usize, percent: f64) -> usize {
    if count == 0 {
        return 0;
    }
    ((count as f64 * percent / 100.0).ceil() as usize).clamp(1, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(product: &str, date: &str, quantity: f64) -> TransactionRecord {
        TransactionRecord {
            customer: "customer".to_string(),
            product: product.to_string(),
            city: "city".to_string(),
            finish: "finish".to_string(),
            order_id: None,
            quantity,
            unit_value: 1.0,
            line_amount: quantity,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
        }
    }

    fn flags() -> SkuFlagConfig {
        SkuFlagConfig { best_seller_percent: 20.0, visible_percent: 80.0 }
    }

    #[test]
    fn window_crosses_year_boundary() {
        let window = MonthWindow::ending_at(MonthKey::new(2024, 2), 4);
        let labels: Vec<String> = window.months().iter().map(MonthKey::label).collect();
        assert_eq!(labels, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(window.position(MonthKey::new(2024, 1)), Some(2));
        assert_eq!(window.position(MonthKey::new(2024, 3)), None);
        assert_eq!(window.position(MonthKey::new(2023, 10)), None);
    }

    #[test]
    fn calendar_year_has_twelve_named_months() {
        let window = MonthWindow::calendar_year(2023);
        assert_eq!(window.len(), 12);
        assert_eq!(window.first(), Some(MonthKey::new(2023, 1)));
        assert_eq!(window.last(), Some(MonthKey::new(2023, 12)));
    }

    #[test]
    #[should_panic(expected = "at least one month")]
    fn zero_width_window_panics() {
        MonthlyAggregator::new(0);
    }

    #[test]
    fn gaps_are_zero_filled_and_length_is_fixed() {
        let records = vec![
            dated("SKU-1", "2024-01-05", 3.0),
            dated("SKU-1", "2024-01-20", 2.0),
            dated("SKU-1", "2024-04-02", 4.0),
            dated("SKU-2", "2024-03-15", 1.0),
        ];

        let set = MonthlyAggregator::new(6).aggregate(
            &records,
            WindowAnchor::EndingAt(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()),
        );

        assert_eq!(set.window.len(), 6);
        let sku1 = set.get("SKU-1").unwrap();
        assert_eq!(sku1.values, vec![5.0, 0.0, 0.0, 4.0, 0.0, 0.0]);
        assert_eq!(sku1.record_count, 3);
        assert!(set.series.iter().all(|series| series.len() == 6));
    }

    #[test]
    fn undated_records_are_skipped_and_counted() {
        let mut undated = dated("SKU-3", "2024-01-01", 9.0);
        undated.date = None;
        let records = vec![dated("SKU-1", "2024-01-05", 3.0), undated, dated("SKU-1", "2019-01-01", 1.0)];

        let set = MonthlyAggregator::new(3).aggregate(
            &records,
            WindowAnchor::LatestRecord { fallback: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap() },
        );

        assert_eq!(set.skipped_undated, 1);
        assert_eq!(set.outside_window, 1);
        assert!(set.get("SKU-3").is_none());
        assert_eq!(set.window.last(), Some(MonthKey::new(2024, 1)));
    }

    #[test]
    fn latest_record_anchor_falls_back_when_nothing_is_dated() {
        let fallback = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        let window = MonthlyAggregator::new(2)
            .resolve_window(&[], WindowAnchor::LatestRecord { fallback });
        assert_eq!(window.last(), Some(MonthKey::new(2025, 5)));
    }

    #[test]
    fn single_month_sku_metrics_use_all_periods_for_min_and_max() {
        let set = SeriesSet {
            window: MonthWindow::ending_at(MonthKey::new(2024, 5), 5),
            series: vec![MonthlySeries::from_values("SKU-1", vec![0.0, 0.0, 6.0, 0.0, 0.0])],
            skipped_undated: 0,
            outside_window: 0,
        };

        let metrics = sku_metrics(&set, AbcThresholds::STANDARD, &flags());
        let sku = &metrics[0];

        assert_eq!(sku.total_sales, 6.0);
        assert!((sku.average_monthly - 1.2).abs() < 1e-12);
        assert_eq!(sku.min_sale, 0.0);
        assert_eq!(sku.max_sale, 6.0);
        assert_eq!(sku.months_with_sales, 1);
        assert_eq!(sku.average_total, 6.0);
        assert_eq!(sku.rank, 1);
        assert!(sku.is_best_seller);
    }

    #[test]
    fn metrics_are_ranked_and_flagged_by_share() {
        let totals = [[1200.0, 0.0], [600.0, 0.0], [60.0, 60.0], [0.0, 0.0], [30.0, 0.0]];
        let series = totals
            .iter()
            .enumerate()
            .map(|(i, values)| MonthlySeries::from_values(format!("SKU-{i}"), values.to_vec()))
            .collect();
        let set = SeriesSet {
            window: MonthWindow::ending_at(MonthKey::new(2024, 2), 2),
            series,
            skipped_undated: 0,
            outside_window: 0,
        };

        let metrics = sku_metrics(&set, AbcThresholds::STANDARD, &flags());

        let order: Vec<&str> = metrics.iter().map(|m| m.sku.as_str()).collect();
        assert_eq!(order, vec!["SKU-0", "SKU-1", "SKU-2", "SKU-4", "SKU-3"]);
        let classes: Vec<AbcClass> = metrics.iter().map(|m| m.class_label).collect();
        assert_eq!(classes[0], AbcClass::A);
        assert_eq!(classes[1], AbcClass::B);

        // 20% of 5 SKUs is one best seller; 80% is four visible SKUs.
        assert_eq!(metrics.iter().filter(|m| m.is_best_seller).count(), 1);
        assert_eq!(metrics.iter().filter(|m| m.is_visible).count(), 4);
        // Zero-sales SKUs are never flagged.
        assert!(!metrics[4].is_visible);
    }

    #[test]
    fn series_statistics() {
        let series = MonthlySeries::from_values("SKU", vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(series.mean(), 5.0);
        assert_eq!(series.std_dev(), 2.0);
        assert_eq!(series.latest(), Some(9.0));
        assert_eq!(series.trailing(3), &[5.0, 7.0, 9.0]);
        assert_eq!(series.trailing(20).len(), 8);
    }

    #[test]
    fn flat_detection_ignores_rounding_residue() {
        assert!(is_flat(&[0.1; 12]));
        assert!(is_flat(&[12.7; 12]));
        assert!(is_flat(&[0.0; 5]));
        assert!(is_flat(&[]));
        assert!(!is_flat(&[0.1, 0.1, 0.2]));
        assert!(!is_flat(&[1000.0, 1000.0, 1001.0]));
    }
}
