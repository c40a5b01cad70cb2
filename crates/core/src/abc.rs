//! ABC (Pareto) classification.
//!
//! Groups records by a key, sums a value per group, ranks groups by
//! descending value and assigns classes from the running cumulative share of
//! the grand total.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Dimension, TransactionRecord, ValueField};

/// Class label assigned by cumulative share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

impl AbcClass {
    pub const ALL: [AbcClass; 3] = [AbcClass::A, AbcClass::B, AbcClass::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            AbcClass::A => "A",
            AbcClass::B => "B",
            AbcClass::C => "C",
        }
    }
}

/// Named threshold profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbcProfile {
    /// A up to 80% of cumulative value, B up to 95%.
    Standard,
    /// A up to 20% of cumulative value, B up to 50%.
    Concentrated,
}

impl std::str::FromStr for AbcProfile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "concentrated" => Ok(Self::Concentrated),
            other => Err(format!("unsupported abc profile `{other}` (expected standard|concentrated)")),
        }
    }
}

/// Cumulative-percentage boundaries (inclusive) for classes A and B.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbcThresholds {
    pub class_a_boundary: f64,
    pub class_b_boundary: f64,
}

impl AbcThresholds {
    pub const STANDARD: AbcThresholds =
        AbcThresholds { class_a_boundary: 80.0, class_b_boundary: 95.0 };

    pub const CONCENTRATED: AbcThresholds =
        AbcThresholds { class_a_boundary: 20.0, class_b_boundary: 50.0 };

    pub fn from_profile(profile: AbcProfile) -> Self {
        match profile {
            AbcProfile::Standard => Self::STANDARD,
            AbcProfile::Concentrated => Self::CONCENTRATED,
        }
    }

    /// Build boundaries from per-class shares that must add up to 100.
    pub fn from_shares(a: f64, b: f64, c: f64) -> Result<Self, String> {
        if a < 0.0 || b < 0.0 || c < 0.0 {
            return Err("abc.shares must not be negative".to_string());
        }
        if ((a + b + c) - 100.0).abs() > 1e-9 {
            return Err(format!("abc.shares must add up to 100 (got {})", a + b + c));
        }
        Ok(Self { class_a_boundary: a, class_b_boundary: a + b })
    }

    pub fn validate(&self) -> Result<(), String> {
        let a = self.class_a_boundary;
        let b = self.class_b_boundary;
        if !(a > 0.0 && a <= 100.0) {
            return Err("abc.class_a_boundary must be in range (0, 100]".to_string());
        }
        if !(b > 0.0 && b <= 100.0) {
            return Err("abc.class_b_boundary must be in range (0, 100]".to_string());
        }
        if a >= b {
            return Err(format!(
                "abc.class_a_boundary ({a}) must be lower than abc.class_b_boundary ({b})"
            ));
        }
        Ok(())
    }

    /// Pure function of the cumulative percentage.
    pub fn classify(&self, cumulative_percentage: f64) -> AbcClass {
        if cumulative_percentage <= self.class_a_boundary {
            AbcClass::A
        } else if cumulative_percentage <= self.class_b_boundary {
            AbcClass::B
        } else {
            AbcClass::C
        }
    }
}

impl Default for AbcThresholds {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// One grouping key's rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAggregate {
    pub key: String,
    pub total_value: f64,
    pub total_quantity: f64,
    pub record_count: u64,
    /// `total_value / total_quantity`, 0 when no quantity.
    pub average_unit_value: f64,
}

impl EntityAggregate {
    fn new(key: String) -> Self {
        Self { key, total_value: 0.0, total_quantity: 0.0, record_count: 0, average_unit_value: 0.0 }
    }

    fn finish(mut self) -> Self {
        self.average_unit_value = if self.total_quantity == 0.0 {
            0.0
        } else {
            self.total_value / self.total_quantity
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEntity {
    #[serde(flatten)]
    pub aggregate: EntityAggregate,
    pub percentage_of_total: f64,
    pub cumulative_percentage: f64,
    pub class_label: AbcClass,
    /// 1-based.
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcBucket {
    pub class_label: AbcClass,
    /// Member keys in rank order.
    pub keys: Vec<String>,
    pub total_value: f64,
    pub percentage_of_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcClassification {
    pub dimension: Option<Dimension>,
    /// Net total, refunds included. Shares are taken over positive groups only.
    pub grand_total: f64,
    pub thresholds: AbcThresholds,
    pub entities: Vec<ClassifiedEntity>,
    /// Always three buckets, in A, B, C order.
    pub buckets: Vec<AbcBucket>,
}

impl AbcClassification {
    pub fn bucket(&self, class_label: AbcClass) -> Option<&AbcBucket> {
        self.buckets.iter().find(|bucket| bucket.class_label == class_label)
    }

    pub fn entity(&self, key: &str) -> Option<&ClassifiedEntity> {
        self.entities.iter().find(|entity| entity.aggregate.key == key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AbcClassifier {
    thresholds: AbcThresholds,
}

impl AbcClassifier {
    pub fn new(thresholds: AbcThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> AbcThresholds {
        self.thresholds
    }

    pub fn classify(
        &self,
        records: &[TransactionRecord],
        dimension: Dimension,
        value_field: ValueField,
    ) -> AbcClassification {
        let mut classification = self.classify_by(
            records,
            |record| record.dimension_key(dimension),
            |record| record.value_of(value_field),
        );
        classification.dimension = Some(dimension);
        classification
    }

    /// Classify with arbitrary key and value selectors.
    pub fn classify_by<K, V>(
        &self,
        records: &[TransactionRecord],
        key: K,
        value: V,
    ) -> AbcClassification
    where
        K: Fn(&TransactionRecord) -> &str,
        V: Fn(&TransactionRecord) -> f64,
    {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut aggregates: Vec<EntityAggregate> = Vec::new();

        for record in records {
            let group_key = key(record);
            let slot = *index.entry(group_key).or_insert_with(|| {
                aggregates.push(EntityAggregate::new(group_key.to_owned()));
                aggregates.len() - 1
            });

            let aggregate = &mut aggregates[slot];
            aggregate.total_value += value(record);
            aggregate.total_quantity += record.quantity;
            aggregate.record_count += 1;
        }

        let aggregates = aggregates.into_iter().map(EntityAggregate::finish).collect();
        self.classify_aggregates(aggregates)
    }

    /// Rank and classify precomputed aggregates (first-seen order breaks ties).
    pub fn classify_aggregates(&self, mut aggregates: Vec<EntityAggregate>) -> AbcClassification {
        // Vec::sort_by is stable, so equal totals keep first-seen order.
        aggregates.sort_by(|a, b| {
            b.total_value.partial_cmp(&a.total_value).unwrap_or(std::cmp::Ordering::Equal)
        });

        // Net-negative groups (refunds) contribute nothing to the shares, so
        // cumulative percentages stay monotonic and within 0..=100.
        let grand_total: f64 = aggregates.iter().map(|aggregate| aggregate.total_value).sum();
        let positive_total: f64 =
            aggregates.iter().map(|aggregate| contribution(aggregate.total_value)).sum();
        let share = |value: f64| {
            if positive_total > 0.0 {
                (value / positive_total * 100.0).min(100.0)
            } else {
                0.0
            }
        };

        let mut running = 0.0;
        let entities: Vec<ClassifiedEntity> = aggregates
            .into_iter()
            .enumerate()
            .map(|(position, aggregate)| {
                running += contribution(aggregate.total_value);
                let cumulative_percentage = share(running);
                ClassifiedEntity {
                    percentage_of_total: share(contribution(aggregate.total_value)),
                    cumulative_percentage,
                    class_label: self.thresholds.classify(cumulative_percentage),
                    rank: position + 1,
                    aggregate,
                }
            })
            .collect();

        let buckets = AbcClass::ALL
            .iter()
            .map(|class_label| {
                let members: Vec<&ClassifiedEntity> =
                    entities.iter().filter(|entity| entity.class_label == *class_label).collect();
                let total_value: f64 = members.iter().map(|entity| entity.aggregate.total_value).sum();
                let contributed: f64 =
                    members.iter().map(|entity| contribution(entity.aggregate.total_value)).sum();
                AbcBucket {
                    class_label: *class_label,
                    keys: members.iter().map(|entity| entity.aggregate.key.clone()).collect(),
                    total_value,
                    percentage_of_total: share(contributed),
                }
            })
            .collect();

        AbcClassification {
            dimension: None,
            grand_total,
            thresholds: self.thresholds,
            entities,
            buckets,
        }
    }
}

fn contribution(total_value: f64) -> f64 {
    total_value.max(0.0)
}
