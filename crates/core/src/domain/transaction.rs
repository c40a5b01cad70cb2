use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AnalyticsError;

/// A numeric field as it arrives from the source system: a JSON number, a
/// (possibly locale-formatted) string, or anything else, which normalizes
/// to 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
    Other(Value),
}

impl From<f64> for RawNumber {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// A key or date field as it arrives from the source system. Exports often
/// carry numeric SKU codes, so numbers are read as their decimal text;
/// anything else normalizes to empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawText {
    Text(String),
    Number(serde_json::Number),
    Other(Value),
}

impl RawText {
    /// Text form of the field, `None` for booleans, arrays and objects.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Number(number) => Some(number.to_string()),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for RawText {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RawText {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// One sales line before normalization.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub customer: Option<RawText>,
    #[serde(default)]
    pub product: Option<RawText>,
    #[serde(default)]
    pub city: Option<RawText>,
    #[serde(default)]
    pub finish: Option<RawText>,
    #[serde(default)]
    pub order_id: Option<RawText>,
    #[serde(default)]
    pub quantity: Option<RawNumber>,
    #[serde(default)]
    pub unit_value: Option<RawNumber>,
    #[serde(default)]
    pub line_amount: Option<RawNumber>,
    #[serde(default)]
    pub date: Option<RawText>,
}

impl RawTransaction {
    pub fn new(product: impl Into<String>) -> Self {
        Self { product: Some(RawText::Text(product.into())), ..Self::default() }
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(RawText::Text(customer.into()));
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(RawText::Text(city.into()));
        self
    }

    pub fn with_finish(mut self, finish: impl Into<String>) -> Self {
        self.finish = Some(RawText::Text(finish.into()));
        self
    }

    pub fn with_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(RawText::Text(order_id.into()));
        self
    }

    pub fn with_quantity(mut self, quantity: impl Into<RawNumber>) -> Self {
        self.quantity = Some(quantity.into());
        self
    }

    pub fn with_unit_value(mut self, unit_value: impl Into<RawNumber>) -> Self {
        self.unit_value = Some(unit_value.into());
        self
    }

    pub fn with_line_amount(mut self, line_amount: impl Into<RawNumber>) -> Self {
        self.line_amount = Some(line_amount.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(RawText::Text(date.into()));
        self
    }
}

/// Parse a JSON array of raw transactions. An empty array is a load failure.
pub fn parse_raw_transactions(json: &str) -> Result<Vec<RawTransaction>, AnalyticsError> {
    let records: Vec<RawTransaction> = serde_json::from_str(json)
        .map_err(|error| AnalyticsError::MalformedInput(error.to_string()))?;

    if records.is_empty() {
        return Err(AnalyticsError::EmptyDataset);
    }

    Ok(records)
}

/// A normalized sales line. Read-only for the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub customer: String,
    pub product: String,
    pub city: String,
    pub finish: String,
    pub order_id: Option<String>,
    pub quantity: f64,
    pub unit_value: f64,
    pub line_amount: f64,
    /// `None` when the source date could not be parsed.
    pub date: Option<NaiveDate>,
}

impl TransactionRecord {
    pub fn dimension_key(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Customer => &self.customer,
            Dimension::Product => &self.product,
            Dimension::City => &self.city,
            Dimension::Finish => &self.finish,
        }
    }

    pub fn value_of(&self, field: ValueField) -> f64 {
        match field {
            ValueField::LineAmount => self.line_amount,
            ValueField::Quantity => self.quantity,
        }
    }
}

/// Grouping dimension for ABC classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Customer,
    Product,
    City,
    Finish,
}

impl Dimension {
    pub const ALL: [Dimension; 4] =
        [Dimension::Customer, Dimension::Product, Dimension::City, Dimension::Finish];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Product => "product",
            Self::City => "city",
            Self::Finish => "finish",
        }
    }
}

impl std::str::FromStr for Dimension {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "product" | "sku" => Ok(Self::Product),
            "city" => Ok(Self::City),
            "finish" => Ok(Self::Finish),
            other => Err(format!(
                "unsupported dimension `{other}` (expected customer|product|city|finish)"
            )),
        }
    }
}

/// Field summed per group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueField {
    LineAmount,
    Quantity,
}
