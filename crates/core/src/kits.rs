//! Kit (product bundle) recommendations.
//!
//! Pairs top-ranked SKUs, keeps the pairs whose association strength clears
//! the threshold and ranks them by projected yearly sales potential.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::association::{AssociationKind, PairStrength};
use crate::series::SkuMetrics;

pub const DEFAULT_POOL_SIZE: usize = 40;
pub const DEFAULT_MAX_PAIR_EVALUATIONS: usize = 1000;
pub const DEFAULT_TOP_K: usize = 20;
pub const DEFAULT_VERSATILE_TOP_K: usize = 15;
pub const DEFAULT_BASE_STOCK_MULTIPLIER: f64 = 2.5;

/// Strength tiers as `(minimum strength, stock bonus, sales impact)`,
/// strongest first.
const STRENGTH_TIERS: [(f64, f64, f64); 3] = [(0.9, 0.30, 1.3), (0.8, 0.20, 1.2), (0.7, 0.10, 1.1)];

const MONTHS_PER_YEAR: f64 = 12.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitConfig {
    pub pool_size: usize,
    pub max_pair_evaluations: usize,
    pub top_k: usize,
    pub versatile_top_k: usize,
    pub base_stock_multiplier: f64,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_pair_evaluations: DEFAULT_MAX_PAIR_EVALUATIONS,
            top_k: DEFAULT_TOP_K,
            versatile_top_k: DEFAULT_VERSATILE_TOP_K,
            base_stock_multiplier: DEFAULT_BASE_STOCK_MULTIPLIER,
        }
    }
}

/// A retained pair of SKUs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitCandidate {
    /// Canonical `low|high` key, independent of pair order.
    pub pair_key: String,
    /// Higher-ranked SKU of the pair.
    pub lead_sku: String,
    pub partner_sku: String,
    pub strength: f64,
    pub kind: AssociationKind,
    pub combined_sales: f64,
    pub combined_average_monthly: f64,
    pub recommended_stock: u64,
    pub sales_potential: f64,
}

impl KitCandidate {
    pub fn contains(&self, sku: &str) -> bool {
        self.lead_sku == sku || self.partner_sku == sku
    }

    pub fn partner_of(&self, sku: &str) -> Option<&str> {
        if self.lead_sku == sku {
            Some(self.partner_sku.as_str())
        } else if self.partner_sku == sku {
            Some(self.lead_sku.as_str())
        } else {
            None
        }
    }
}

/// A SKU that appears in more than one retained pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersatileProduct {
    pub sku: String,
    pub kit_count: usize,
    /// Kit partners in ascending order.
    pub partners: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitRecommendations {
    pub kind: AssociationKind,
    pub threshold: f64,
    /// SKUs that entered pair enumeration.
    pub pool_size: usize,
    pub pairs_evaluated: usize,
    pub pairs_retained: usize,
    /// Enumeration stopped at `max_pair_evaluations`.
    pub evaluation_capped: bool,
    pub kits: Vec<KitCandidate>,
    pub versatile: Vec<VersatileProduct>,
    /// Every retained pair in ranked order, before the `top_k` cut.
    #[serde(skip)]
    pub retained: Vec<KitCandidate>,
}

impl KitRecommendations {
    pub fn empty(kind: AssociationKind, threshold: f64) -> Self {
        Self {
            kind,
            threshold,
            pool_size: 0,
            pairs_evaluated: 0,
            pairs_retained: 0,
            evaluation_capped: false,
            kits: Vec::new(),
            versatile: Vec::new(),
            retained: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kits.is_empty()
    }

    /// Retained partners of `sku` with their pair strength.
    pub fn partners_of(&self, sku: &str) -> Vec<(String, f64)> {
        self.retained
            .iter()
            .filter_map(|kit| kit.partner_of(sku).map(|partner| (partner.to_string(), kit.strength)))
            .collect()
    }
}

/// `(stock bonus, sales impact)` for a pair strength.
pub fn strength_tier(strength: f64) -> (f64, f64) {
    STRENGTH_TIERS
        .iter()
        .find(|(minimum, _, _)| strength >= *minimum)
        .map(|(_, bonus, impact)| (*bonus, *impact))
        .unwrap_or((0.0, 1.0))
}

fn kit_order(left: &KitCandidate, right: &KitCandidate) -> Ordering {
    right
        .sales_potential
        .total_cmp(&left.sales_potential)
        .then_with(|| right.strength.total_cmp(&left.strength))
        .then_with(|| left.pair_key.cmp(&right.pair_key))
}

fn canonical_pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct KitRecommender {
    config: KitConfig,
}

impl KitRecommender {
    pub fn new(config: KitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KitConfig {
        &self.config
    }

    /// Recommend kits using the source's own minimum strength.
    pub fn recommend<S>(&self, metrics: &[SkuMetrics], source: &S) -> KitRecommendations
    where
        S: PairStrength + ?Sized,
    {
        self.recommend_with_threshold(metrics, source, source.minimum_strength())
    }

    /// Recompute from scratch with an overridden minimum strength.
    ///
    /// `metrics` must be in rank order.
    pub fn recommend_with_threshold<S>(
        &self,
        metrics: &[SkuMetrics],
        source: &S,
        threshold: f64,
    ) -> KitRecommendations
    where
        S: PairStrength + ?Sized,
    {
        let kind = source.kind();
        let pool: Vec<&SkuMetrics> = metrics
            .iter()
            .filter(|sku| sku.total_sales > 0.0)
            .take(self.config.pool_size)
            .collect();

        if pool.len() < 2 {
            debug!(
                event_name = "analytics.kits.pool_too_small",
                pool_size = pool.len(),
                "not enough selling SKUs to form kits"
            );
            return KitRecommendations { pool_size: pool.len(), ..KitRecommendations::empty(kind, threshold) };
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut evaluated = 0usize;
        let mut evaluation_capped = false;
        let mut retained: Vec<KitCandidate> = Vec::new();

        'scan: for (index, lead) in pool.iter().enumerate() {
            for partner in &pool[index + 1..] {
                if lead.sku == partner.sku {
                    continue;
                }
                let pair_key = canonical_pair_key(&lead.sku, &partner.sku);
                if !seen.insert(pair_key.clone()) {
                    continue;
                }
                if evaluated >= self.config.max_pair_evaluations {
                    evaluation_capped = true;
                    break 'scan;
                }
                evaluated += 1;

                let Some(strength) = source.strength(&lead.sku, &partner.sku) else {
                    continue;
                };
                if !strength.is_finite() || strength < threshold {
                    continue;
                }

                retained.push(self.build_candidate(pair_key, lead, partner, strength, kind));
            }
        }

        retained.sort_by(kit_order);
        let versatile = self.versatile_products(&retained);
        let kits: Vec<KitCandidate> = retained.iter().take(self.config.top_k).cloned().collect();

        info!(
            event_name = "analytics.kits.recommended",
            kind = kind.as_str(),
            threshold,
            pairs_evaluated = evaluated,
            pairs_retained = retained.len(),
            evaluation_capped,
            kits = kits.len(),
            "kit recommendations computed"
        );

        KitRecommendations {
            kind,
            threshold,
            pool_size: pool.len(),
            pairs_evaluated: evaluated,
            pairs_retained: retained.len(),
            evaluation_capped,
            kits,
            versatile,
            retained,
        }
    }

    fn build_candidate(
        &self,
        pair_key: String,
        lead: &SkuMetrics,
        partner: &SkuMetrics,
        strength: f64,
        kind: AssociationKind,
    ) -> KitCandidate {
        let (bonus, impact) = strength_tier(strength);
        let combined_average_monthly = (lead.average_monthly + partner.average_monthly) / 2.0;
        let stock =
            (lead.average_monthly * self.config.base_stock_multiplier * (1.0 + bonus)).ceil();

        KitCandidate {
            pair_key,
            lead_sku: lead.sku.clone(),
            partner_sku: partner.sku.clone(),
            strength,
            kind,
            combined_sales: lead.total_sales + partner.total_sales,
            combined_average_monthly,
            recommended_stock: stock.max(0.0) as u64,
            sales_potential: combined_average_monthly * strength * MONTHS_PER_YEAR * impact,
        }
    }

    fn versatile_products(&self, retained: &[KitCandidate]) -> Vec<VersatileProduct> {
        let mut tally: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for kit in retained {
            tally.entry(kit.lead_sku.as_str()).or_default().insert(kit.partner_sku.as_str());
            tally.entry(kit.partner_sku.as_str()).or_default().insert(kit.lead_sku.as_str());
        }

        let mut versatile: Vec<VersatileProduct> = tally
            .into_iter()
            .filter(|(_, partners)| partners.len() > 1)
            .map(|(sku, partners)| VersatileProduct {
                sku: sku.to_string(),
                kit_count: partners.len(),
                partners: partners.into_iter().map(str::to_string).collect(),
            })
            .collect();
        versatile.sort_by(|left, right| {
            right.kit_count.cmp(&left.kit_count).then_with(|| left.sku.cmp(&right.sku))
        });
        versatile.truncate(self.config.versatile_top_k);
        versatile
    }
}
