use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    AssociationKind, PairStrength, DEFAULT_MIN_CONFIDENCE, DEFAULT_MIN_LIFT, DEFAULT_MIN_SUPPORT,
    DEFAULT_RULES_PER_SKU,
};
use crate::domain::TransactionRecord;

/// Minimums a directed rule must meet, plus the per-antecedent cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketConfig {
    pub min_support: f64,
    pub min_confidence: f64,
    pub min_lift: f64,
    pub rules_per_sku: usize,
}

impl Default for BasketConfig {
    fn default() -> Self {
        Self {
            min_support: DEFAULT_MIN_SUPPORT,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            min_lift: DEFAULT_MIN_LIFT,
            rules_per_sku: DEFAULT_RULES_PER_SKU,
        }
    }
}

/// Distinct products bought under one order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub order_id: String,
    pub products: BTreeSet<String>,
}

impl Basket {
    pub fn is_multi_item(&self) -> bool {
        self.products.len() >= 2
    }
}

/// Directed two-item rule `antecedent -> consequent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedent: String,
    pub consequent: String,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    /// Baskets containing both products.
    pub co_occurrences: u64,
}

fn rule_order(left: &AssociationRule, right: &AssociationRule) -> Ordering {
    right
        .confidence
        .total_cmp(&left.confidence)
        .then_with(|| right.lift.total_cmp(&left.lift))
        .then_with(|| left.consequent.cmp(&right.consequent))
}

/// Retained rules, grouped by antecedent (ascending) and ranked within each
/// group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasketRules {
    pub basket_count: usize,
    pub rules: Vec<AssociationRule>,
    min_confidence: f64,
}

impl BasketRules {
    pub fn rules_for<'a>(&'a self, antecedent: &'a str) -> impl Iterator<Item = &'a AssociationRule> {
        self.rules.iter().filter(move |rule| rule.antecedent == antecedent)
    }

    pub fn rule(&self, antecedent: &str, consequent: &str) -> Option<&AssociationRule> {
        self.rules
            .iter()
            .find(|rule| rule.antecedent == antecedent && rule.consequent == consequent)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl PairStrength for BasketRules {
    fn kind(&self) -> AssociationKind {
        AssociationKind::Basket
    }

    fn strength(&self, a: &str, b: &str) -> Option<f64> {
        let forward = self.rule(a, b).map(|rule| rule.confidence);
        let backward = self.rule(b, a).map(|rule| rule.confidence);
        match (forward, backward) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (one, other) => one.or(other),
        }
    }

    fn minimum_strength(&self) -> f64 {
        self.min_confidence
    }

    fn associations_of(&self, sku: &str) -> Vec<(String, f64)> {
        self.rules_for(sku).map(|rule| (rule.consequent.clone(), rule.confidence)).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BasketAssociationMiner {
    config: BasketConfig,
}

impl BasketAssociationMiner {
    pub fn new(config: BasketConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BasketConfig {
        &self.config
    }

    /// Group records into baskets by order id, in first-seen order. Records
    /// without an order id belong to no basket.
    pub fn baskets(records: &[TransactionRecord]) -> Vec<Basket> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut baskets: Vec<Basket> = Vec::new();

        for record in records {
            let Some(order_id) = record.order_id.as_deref() else {
                continue;
            };
            let slot = *index.entry(order_id).or_insert_with(|| {
                baskets.push(Basket { order_id: order_id.to_string(), products: BTreeSet::new() });
                baskets.len() - 1
            });
            baskets[slot].products.insert(record.product.clone());
        }

        baskets
    }

    pub fn has_multi_item_baskets(baskets: &[Basket]) -> bool {
        baskets.iter().any(Basket::is_multi_item)
    }

    pub fn mine(&self, baskets: &[Basket]) -> BasketRules {
        let basket_count = baskets.len();
        let mut rules_out = BasketRules {
            basket_count,
            rules: Vec::new(),
            min_confidence: self.config.min_confidence,
        };
        if basket_count == 0 {
            return rules_out;
        }

        let mut item_counts: BTreeMap<&str, u64> = BTreeMap::new();
        let mut pair_counts: BTreeMap<(&str, &str), u64> = BTreeMap::new();

        for basket in baskets {
            for product in &basket.products {
                *item_counts.entry(product.as_str()).or_default() += 1;
            }
            for antecedent in &basket.products {
                for consequent in &basket.products {
                    if antecedent != consequent {
                        *pair_counts
                            .entry((antecedent.as_str(), consequent.as_str()))
                            .or_default() += 1;
                    }
                }
            }
        }

        let total = basket_count as f64;
        let mut by_antecedent: BTreeMap<&str, Vec<AssociationRule>> = BTreeMap::new();

        for ((antecedent, consequent), both) in pair_counts {
            let with_antecedent = item_counts.get(antecedent).copied().unwrap_or(0);
            let with_consequent = item_counts.get(consequent).copied().unwrap_or(0);
            if with_antecedent == 0 || with_consequent == 0 {
                continue;
            }

            let support = both as f64 / total;
            let confidence = both as f64 / with_antecedent as f64;
            let lift = confidence / (with_consequent as f64 / total);

            if support < self.config.min_support
                || confidence < self.config.min_confidence
                || lift < self.config.min_lift
            {
                continue;
            }

            by_antecedent.entry(antecedent).or_default().push(AssociationRule {
                antecedent: antecedent.to_string(),
                consequent: consequent.to_string(),
                support,
                confidence,
                lift,
                co_occurrences: both,
            });
        }

        for (_, mut rules) in by_antecedent {
            rules.sort_by(rule_order);
            rules.truncate(self.config.rules_per_sku);
            rules_out.rules.extend(rules);
        }

        debug!(
            event_name = "analytics.basket.mined",
            basket_count,
            rule_count = rules_out.rules.len(),
            "basket rules mined"
        );

        rules_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(order: &str, product: &str) -> TransactionRecord {
        TransactionRecord {
            customer: "customer".to_string(),
            product: product.to_string(),
            city: "city".to_string(),
            finish: "finish".to_string(),
            order_id: Some(order.to_string()),
            quantity: 1.0,
            unit_value: 1.0,
            line_amount: 1.0,
            date: None,
        }
    }

    fn permissive() -> BasketConfig {
        BasketConfig { min_support: 0.0, min_confidence: 0.0, min_lift: 0.0, rules_per_sku: 10 }
    }

    fn sample_baskets() -> Vec<Basket> {
        let records = vec![
            line("O1", "TILE"),
            line("O1", "GROUT"),
            line("O2", "TILE"),
            line("O2", "GROUT"),
            line("O2", "GROUT"),
            line("O3", "TILE"),
            line("O3", "ADHESIVE"),
            line("O4", "ADHESIVE"),
        ];
        BasketAssociationMiner::baskets(&records)
    }

    #[test]
    fn baskets_hold_distinct_products_per_order() {
        let baskets = sample_baskets();
        assert_eq!(baskets.len(), 4);
        assert_eq!(baskets[1].order_id, "O2");
        assert_eq!(baskets[1].products.len(), 2);
        assert!(!baskets[3].is_multi_item());
        assert!(BasketAssociationMiner::has_multi_item_baskets(&baskets));
    }

    #[test]
    fn records_without_orders_form_no_baskets() {
        let mut record = line("O1", "TILE");
        record.order_id = None;
        let baskets = BasketAssociationMiner::baskets(&[record]);
        assert!(baskets.is_empty());
        assert!(BasketAssociationMiner::new(permissive()).mine(&baskets).is_empty());
    }

    #[test]
    fn support_confidence_and_lift() {
        let rules = BasketAssociationMiner::new(permissive()).mine(&sample_baskets());

        let grout_to_tile = rules.rule("GROUT", "TILE").unwrap();
        assert_eq!(grout_to_tile.support, 0.5);
        assert_eq!(grout_to_tile.confidence, 1.0);
        // P(TILE) = 3/4, so lift = 1 / 0.75.
        assert!((grout_to_tile.lift - 4.0 / 3.0).abs() < 1e-12);

        let tile_to_grout = rules.rule("TILE", "GROUT").unwrap();
        assert!((tile_to_grout.confidence - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(tile_to_grout.co_occurrences, 2);
    }

    #[test]
    fn rules_are_ranked_and_capped_per_antecedent() {
        let config = BasketConfig { rules_per_sku: 1, ..permissive() };
        let rules = BasketAssociationMiner::new(config).mine(&sample_baskets());

        let from_tile: Vec<&AssociationRule> = rules.rules_for("TILE").collect();
        assert_eq!(from_tile.len(), 1);
        assert_eq!(from_tile[0].consequent, "GROUT");

        let antecedents: Vec<&str> = rules.rules.iter().map(|rule| rule.antecedent.as_str()).collect();
        let mut sorted = antecedents.clone();
        sorted.sort();
        assert_eq!(antecedents, sorted);
    }

    #[test]
    fn minimums_filter_rules() {
        let config = BasketConfig { min_confidence: 0.9, ..permissive() };
        let rules = BasketAssociationMiner::new(config).mine(&sample_baskets());
        assert!(rules.rules.iter().all(|rule| rule.confidence >= 0.9));
        assert!(rules.rule("TILE", "GROUT").is_none());

        let config = BasketConfig { min_lift: 1.5, ..permissive() };
        let rules = BasketAssociationMiner::new(config).mine(&sample_baskets());
        assert!(rules.rule("GROUT", "TILE").is_none());
        assert!(rules.rule("ADHESIVE", "TILE").is_none());
    }

    #[test]
    fn rare_pairs_fall_below_minimum_support() {
        let mut records = vec![
            line("O1", "TILE"),
            line("O1", "GROUT"),
            line("O2", "TILE"),
            line("O2", "GROUT"),
            line("O3", "TILE"),
            line("O3", "GROUT"),
            line("O4", "TILE"),
            line("O10", "KIT-A"),
            line("O10", "KIT-B"),
        ];
        records.extend((5..=9).map(|order| line(&format!("O{order}"), "PAINT")));
        let baskets = BasketAssociationMiner::baskets(&records);
        assert_eq!(baskets.len(), 10);

        let config =
            BasketConfig { min_support: 0.2, min_confidence: 0.5, min_lift: 1.0, rules_per_sku: 10 };
        let rules = BasketAssociationMiner::new(config.clone()).mine(&baskets);
        // KIT-A -> KIT-B: support 0.1, confidence 1.0, lift 10.
        assert!(rules.rule("KIT-A", "KIT-B").is_none());
        assert!(rules.rule("KIT-B", "KIT-A").is_none());
        assert!(rules.rule("GROUT", "TILE").is_some());

        let relaxed = BasketConfig { min_support: 0.05, ..config };
        let rules = BasketAssociationMiner::new(relaxed).mine(&baskets);
        let kit = rules.rule("KIT-A", "KIT-B").unwrap();
        assert_eq!(kit.confidence, 1.0);
        assert!((kit.lift - 10.0).abs() < 1e-9);
    }

    #[test]
    fn pair_strength_takes_the_stronger_direction() {
        let rules = BasketAssociationMiner::new(permissive()).mine(&sample_baskets());
        assert_eq!(rules.strength("TILE", "GROUT"), Some(1.0));
        assert_eq!(rules.strength("GROUT", "TILE"), Some(1.0));
        assert_eq!(rules.strength("GROUT", "ADHESIVE"), None);
        assert_eq!(rules.kind(), AssociationKind::Basket);

        let from_tile = rules.associations_of("TILE");
        assert_eq!(from_tile[0].0, "GROUT");
    }
}
