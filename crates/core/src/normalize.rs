//! Record normalization.
//!
//! Raw transaction fields arrive as numbers or locale-formatted strings. This
//! module is the single place where that ambiguity is resolved:
//!
//! 1. null / absent / empty → 0
//! 2. strip everything except digits, `.` and `,`
//! 3. `,` is the decimal separator
//! 4. unparseable → 0
//!
//! Thousands separators (`1.234,56`) are not understood and degrade to 0.
//! Booleans, arrays and objects in numeric fields degrade to 0 as well; in key
//! fields numbers are read as text and anything else as empty.
//! Nothing here returns an error; every fallback is counted in a
//! [`DataQualityReport`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{RawNumber, RawText, RawTransaction, TransactionRecord};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Counters for degraded or skipped input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub records_seen: u64,
    pub defaulted_quantity: u64,
    pub defaulted_unit_value: u64,
    /// Line amount computed as quantity × unit value.
    pub derived_line_amount: u64,
    /// Line amount missing and not derivable; set to 0.
    pub defaulted_line_amount: u64,
    pub invalid_dates: u64,
    /// Customer, product, city, finish or order fields that were neither text
    /// nor a number; read as empty.
    pub defaulted_keys: u64,
    pub negative_quantities: u64,
    /// Records left out of monthly aggregation because their date is invalid.
    pub skipped_undated: u64,
    /// Dated records that fall outside the analysis window.
    pub outside_window: u64,
}

impl DataQualityReport {
    /// Total number of field-level degradations (excludes aggregation skips).
    pub fn degraded_fields(&self) -> u64 {
        self.defaulted_quantity
            + self.defaulted_unit_value
            + self.defaulted_line_amount
            + self.invalid_dates
            + self.defaulted_keys
    }

    pub fn is_clean(&self) -> bool {
        self.degraded_fields() == 0 && self.negative_quantities == 0
    }
}

/// Parse a locale-formatted numeric string. Returns `None` when nothing
/// numeric can be recovered.
pub fn parse_locale_number(input: &str) -> Option<f64> {
    let cleaned: String = input
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == ',')
        .map(|ch| if ch == ',' { '.' } else { ch })
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Resolve a raw numeric field, `None` meaning "absent or unparseable".
pub fn parse_raw_number(raw: Option<&RawNumber>) -> Option<f64> {
    match raw? {
        RawNumber::Number(value) => value.is_finite().then_some(*value),
        RawNumber::Text(text) => parse_locale_number(text),
        RawNumber::Other(_) => None,
    }
}

/// Coerce a raw numeric field, falling back to 0.
pub fn coerce_number(raw: Option<&RawNumber>) -> f64 {
    parse_raw_number(raw).unwrap_or(0.0)
}

/// Parse a transaction date. Invalid input yields `None`, never a default date.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(date) =
        DATE_FORMATS.iter().find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
    {
        return Some(date);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(timestamp.date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|timestamp| timestamp.date())
}

/// Stateless normalizer that accumulates data-quality counters as it goes.
#[derive(Debug, Default)]
pub struct RecordNormalizer {
    report: DataQualityReport,
}

impl RecordNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, raw: &RawTransaction) -> TransactionRecord {
        self.report.records_seen += 1;

        let quantity = match parse_raw_number(raw.quantity.as_ref()) {
            Some(value) => value,
            None => {
                self.report.defaulted_quantity += 1;
                0.0
            }
        };
        if quantity < 0.0 {
            self.report.negative_quantities += 1;
        }

        let unit_value = match parse_raw_number(raw.unit_value.as_ref()) {
            Some(value) => value,
            None => {
                self.report.defaulted_unit_value += 1;
                0.0
            }
        };

        let line_amount = match parse_raw_number(raw.line_amount.as_ref()) {
            Some(value) => value,
            None => {
                let derivable = parse_raw_number(raw.quantity.as_ref()).is_some()
                    || parse_raw_number(raw.unit_value.as_ref()).is_some();
                if derivable {
                    self.report.derived_line_amount += 1;
                } else {
                    self.report.defaulted_line_amount += 1;
                }
                quantity * unit_value
            }
        };

        let raw_date = raw.date.as_ref().and_then(RawText::as_text);
        let date = raw_date.as_deref().and_then(parse_date);
        if date.is_none() {
            self.report.invalid_dates += 1;
            debug!(
                event_name = "analytics.normalize.invalid_date",
                raw_date = raw_date.as_deref().unwrap_or("<missing>"),
                "transaction date could not be parsed"
            );
        }

        let order_id = self.text_field(raw.order_id.as_ref(), "order_id");
        TransactionRecord {
            customer: self.text_field(raw.customer.as_ref(), "customer"),
            product: self.text_field(raw.product.as_ref(), "product"),
            city: self.text_field(raw.city.as_ref(), "city"),
            finish: self.text_field(raw.finish.as_ref(), "finish"),
            order_id: (!order_id.is_empty()).then_some(order_id),
            quantity,
            unit_value,
            line_amount,
            date,
        }
    }

    /// Trimmed text of a key field; empty when absent or not text-like.
    fn text_field(&mut self, raw: Option<&RawText>, field: &'static str) -> String {
        let Some(raw) = raw else {
            return String::new();
        };
        match raw.as_text() {
            Some(text) => text.trim().to_owned(),
            None => {
                self.report.defaulted_keys += 1;
                debug!(
                    event_name = "analytics.normalize.defaulted_key",
                    field,
                    "key field is neither text nor a number"
                );
                String::new()
            }
        }
    }

    pub fn normalize_all(&mut self, raw: &[RawTransaction]) -> Vec<TransactionRecord> {
        raw.iter().map(|transaction| self.normalize(transaction)).collect()
    }

    pub fn report(&self) -> &DataQualityReport {
        &self.report
    }

    pub fn into_report(self) -> DataQualityReport {
        self.report
    }
}
