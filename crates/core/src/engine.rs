//! One-shot analytics recompute.
//!
//! `MerchandisingEngine` owns nothing but its configuration. Every call runs
//! the whole pipeline from records to report, so a changed control (window,
//! threshold, method) is just another call.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::abc::{AbcClassification, AbcClassifier};
use crate::association::{
    AssociationKind, BasketAssociationMiner, CorrelationMatrix, PairStrength,
};
use crate::config::AnalyticsConfig;
use crate::domain::{Dimension, RawTransaction, TransactionRecord, ValueField};
use crate::errors::AnalyticsError;
use crate::kits::{KitRecommendations, KitRecommender};
use crate::normalize::{DataQualityReport, RecordNormalizer};
use crate::series::{sku_metrics, MonthWindow, MonthlyAggregator, SeriesSet, SkuMetrics};
use crate::stock::{
    ForecastAdjustment, MomentumForecastAdjuster, SafetyMargin, SafetyMarginCalculator,
};

/// Everything known about one SKU after a recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuInsight {
    #[serde(flatten)]
    pub metrics: SkuMetrics,
    pub safety: SafetyMargin,
    pub forecast: ForecastAdjustment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub as_of: NaiveDate,
    pub window: MonthWindow,
    pub data_quality: DataQualityReport,
    pub association_kind: AssociationKind,
    pub classifications: Vec<AbcClassification>,
    /// Rank order.
    pub sku_insights: Vec<SkuInsight>,
    pub kits: KitRecommendations,
}

impl AnalyticsReport {
    pub fn insight(&self, sku: &str) -> Option<&SkuInsight> {
        self.sku_insights.iter().find(|insight| insight.metrics.sku == sku)
    }

    pub fn classification(&self, dimension: Dimension) -> Option<&AbcClassification> {
        self.classifications.iter().find(|classification| classification.dimension == Some(dimension))
    }
}

/// Kit results plus the per-SKU associations that feed forecasting.
struct AssociationOutcome {
    kits: KitRecommendations,
    links: HashMap<String, Vec<(String, f64)>>,
}

#[derive(Debug, Clone)]
pub struct MerchandisingEngine {
    config: AnalyticsConfig,
}

impl MerchandisingEngine {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Normalize raw transactions, then analyze them.
    pub fn analyze_raw(
        &self,
        raw: &[RawTransaction],
        as_of: NaiveDate,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        if raw.is_empty() {
            return Err(AnalyticsError::EmptyDataset);
        }
        let mut normalizer = RecordNormalizer::new();
        let records = normalizer.normalize_all(raw);
        Ok(self.analyze(&records, normalizer.into_report(), as_of))
    }

    pub fn analyze(
        &self,
        records: &[TransactionRecord],
        mut quality: DataQualityReport,
        as_of: NaiveDate,
    ) -> AnalyticsReport {
        info!(
            event_name = "analytics.recompute.started",
            record_count = records.len(),
            as_of = %as_of,
            window_months = self.config.window.months,
            "analytics recompute started"
        );

        let set = self.series(records, as_of);
        quality.skipped_undated = set.skipped_undated;
        quality.outside_window = set.outside_window;

        let classifier = AbcClassifier::new(self.config.abc);
        let classifications = Dimension::ALL
            .iter()
            .map(|dimension| classifier.classify(records, *dimension, ValueField::LineAmount))
            .collect();

        let metrics = sku_metrics(&set, self.config.abc, &self.config.sku_flags);
        let outcome = self.associate(records, &set, &metrics, None);

        let margins: HashMap<String, SafetyMargin> =
            SafetyMarginCalculator::new(self.config.safety.clone())
                .calculate(&set)
                .into_iter()
                .map(|margin| (margin.sku.clone(), margin))
                .collect();

        let adjuster = MomentumForecastAdjuster::new(self.config.momentum.clone());
        let no_links: Vec<(String, f64)> = Vec::new();
        let sku_insights: Vec<SkuInsight> = metrics
            .into_iter()
            .filter_map(|metrics| {
                let safety = margins.get(&metrics.sku)?.clone();
                let base = metrics.average_monthly
                    * self.config.stock_multipliers.for_class(metrics.class_label);
                let links = outcome.links.get(&metrics.sku).unwrap_or(&no_links);
                let forecast = adjuster.adjust(&metrics.sku, base, links, outcome.kits.kind, &set);
                Some(SkuInsight { metrics, safety, forecast })
            })
            .collect();

        info!(
            event_name = "analytics.recompute.finished",
            sku_count = sku_insights.len(),
            kit_count = outcome.kits.kits.len(),
            association_kind = outcome.kits.kind.as_str(),
            skipped_undated = quality.skipped_undated,
            outside_window = quality.outside_window,
            "analytics recompute finished"
        );

        AnalyticsReport {
            as_of,
            window: set.window,
            data_quality: quality,
            association_kind: outcome.kits.kind,
            classifications,
            sku_insights,
            kits: outcome.kits,
        }
    }

    /// Kit recommendations only, optionally with an overridden minimum
    /// association strength.
    pub fn recommend_kits(
        &self,
        records: &[TransactionRecord],
        as_of: NaiveDate,
        threshold: Option<f64>,
    ) -> KitRecommendations {
        let set = self.series(records, as_of);
        let metrics = sku_metrics(&set, self.config.abc, &self.config.sku_flags);
        self.associate(records, &set, &metrics, threshold).kits
    }

    fn series(&self, records: &[TransactionRecord], as_of: NaiveDate) -> SeriesSet {
        let aggregator = MonthlyAggregator::new(self.config.window.len());
        aggregator.aggregate(records, self.config.window.anchor(as_of))
    }

    fn associate(
        &self,
        records: &[TransactionRecord],
        set: &SeriesSet,
        metrics: &[SkuMetrics],
        threshold: Option<f64>,
    ) -> AssociationOutcome {
        let baskets = BasketAssociationMiner::baskets(records);
        let multi_item = BasketAssociationMiner::has_multi_item_baskets(&baskets);
        let kind = self.config.association.method.resolve(multi_item);

        info!(
            event_name = "analytics.association.method_selected",
            configured = self.config.association.method.as_str(),
            selected = kind.as_str(),
            basket_count = baskets.len(),
            multi_item_baskets = multi_item,
            "association method selected"
        );

        let recommender = KitRecommender::new(self.config.kits.clone());
        match kind {
            AssociationKind::Correlation => {
                let matrix = CorrelationMatrix::new(set, self.config.association.correlation_threshold);
                let kits = recommend(&recommender, metrics, &matrix, threshold);
                let links = metrics
                    .iter()
                    .map(|sku| (sku.sku.clone(), kits.partners_of(&sku.sku)))
                    .filter(|(_, partners)| !partners.is_empty())
                    .collect();
                AssociationOutcome { kits, links }
            }
            AssociationKind::Basket => {
                let mut basket = self.config.association.basket.clone();
                if let Some(threshold) = threshold {
                    // Rules are filtered on confidence while mining.
                    basket.min_confidence = threshold.max(0.0);
                }
                let rules = BasketAssociationMiner::new(basket).mine(&baskets);
                let kits = recommend(&recommender, metrics, &rules, threshold);
                let links = metrics
                    .iter()
                    .map(|sku| (sku.sku.clone(), rules.associations_of(&sku.sku)))
                    .filter(|(_, links)| !links.is_empty())
                    .collect();
                AssociationOutcome { kits, links }
            }
        }
    }
}

fn recommend<S: PairStrength>(
    recommender: &KitRecommender,
    metrics: &[SkuMetrics],
    source: &S,
    threshold: Option<f64>,
) -> KitRecommendations {
    match threshold {
        Some(threshold) => recommender.recommend_with_threshold(metrics, source, threshold),
        None => recommender.recommend(metrics, source),
    }
}
