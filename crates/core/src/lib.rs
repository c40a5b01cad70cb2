pub mod abc;
pub mod association;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod kits;
pub mod normalize;
pub mod series;
pub mod stock;

pub use abc::{AbcClass, AbcClassification, AbcClassifier, AbcProfile, AbcThresholds};
pub use association::{
    pearson, AssociationKind, AssociationMethod, AssociationRule, BasketAssociationMiner,
    BasketRules, CorrelationMatrix, PairStrength,
};
pub use config::{AnalyticsConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::{Dimension, RawTransaction, TransactionRecord, ValueField};
pub use engine::{AnalyticsReport, MerchandisingEngine, SkuInsight};
pub use errors::{AnalyticsError, ApplicationError};
pub use kits::{KitCandidate, KitRecommendations, KitRecommender, VersatileProduct};
pub use normalize::{DataQualityReport, RecordNormalizer};
pub use series::{MonthKey, MonthWindow, MonthlyAggregator, SeriesSet, SkuMetrics, WindowAnchor};
pub use stock::{
    ForecastAdjustment, MomentumForecastAdjuster, SafetyMargin, SafetyMarginCalculator,
};
